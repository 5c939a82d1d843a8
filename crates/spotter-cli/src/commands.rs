//! Command handlers. Results go to stdout, logs to stderr.

use anyhow::{bail, Result};
use tracing::{info, warn};

use spotter_client::{ChatSummary, Detection, ProfileDraft, Session};
use spotter_shared::protocol::{ChatMessage, UserProfile};
use spotter_shared::UserId;

fn print_profile(profile: &UserProfile) {
    let fields = &profile.fields;
    println!(
        "{} ({}): {} at {}, {}",
        profile.display_name(),
        profile.id,
        fields.workout_type,
        fields.gym_name,
        fields.timing
    );
}

fn print_message(me: &UserId, message: &ChatMessage) {
    let who = if &message.sender_id == me {
        "you".to_string()
    } else {
        message.sender_id.to_string()
    };
    println!(
        "[{}] {who}: {}",
        message.created_at.format("%Y-%m-%d %H:%M:%S"),
        message.text
    );
}

fn print_summary(summary: &ChatSummary) {
    println!(
        "{:<20} {}  ({})",
        summary.counterpart.as_str(),
        summary.preview,
        summary.last_activity.format("%Y-%m-%d %H:%M")
    );
}

pub async fn profile_set(session: &Session, draft: &ProfileDraft) -> Result<()> {
    let profile = if session.my_profile().await?.is_some() {
        session.update_profile(draft).await?
    } else {
        session.setup_profile(draft).await?
    };
    print_profile(&profile);
    Ok(())
}

pub async fn profile_show(session: &Session, user: &UserId) -> Result<()> {
    match session.load_profile(user).await? {
        Some(profile) => print_profile(&profile),
        None => bail!("{user} has no profile"),
    }
    Ok(())
}

pub async fn feed(session: &Session) -> Result<()> {
    let candidates = session.candidates().await?;
    if candidates.is_empty() {
        println!("Nobody to show yet.");
    }
    for profile in &candidates {
        print_profile(profile);
    }
    Ok(())
}

pub async fn like(session: &Session, target: &UserId) -> Result<()> {
    let outcome = session.swipe_right(target).await?;
    match outcome.detection {
        Detection::NotReciprocated => println!("Liked {target}."),
        Detection::AlreadyMatched(_) => println!("You and {target} are already matched."),
        Detection::Created(record) => {
            println!("It's a match with {target}! ({})", record.id);
        }
    }
    Ok(())
}

pub async fn matches(session: &Session) -> Result<()> {
    let profiles = session.matched_profiles().await?;
    if profiles.is_empty() {
        println!("No matches yet.");
    }
    for profile in &profiles {
        print_profile(profile);
    }
    Ok(())
}

pub async fn chats(session: &Session) -> Result<()> {
    for summary in session.chat_summaries().await? {
        print_summary(&summary);
    }
    Ok(())
}

pub async fn send(session: &Session, to: &UserId, text: &str) -> Result<()> {
    match session.send_message(to, text).await? {
        Some(message) => print_message(session.me(), &message),
        None => println!("Nothing to send."),
    }
    Ok(())
}

pub async fn history(session: &Session, with: &UserId) -> Result<()> {
    let mut room = session.open_chat(with).await?;
    let messages = match room.next_messages().await {
        Some(delivery) => delivery?,
        None => Vec::new(),
    };
    room.close();

    if messages.is_empty() {
        println!("No messages with {with} yet.");
    }
    for message in &messages {
        print_message(session.me(), message);
    }
    Ok(())
}

/// Print new matches and chat list changes until Ctrl-C.
pub async fn watch(session: &Session) -> Result<()> {
    let mut notifier = session.watch_new_matches();
    let known = notifier.prime().await?;
    let mut chats = session.watch_chats();
    info!(known, "watching for matches and messages");
    println!("Watching as {} (Ctrl-C to stop)", session.me());

    loop {
        tokio::select! {
            found = notifier.next() => match found {
                Some(Ok(new)) => println!("New match: {}", new.display_name()),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            delivery = chats.next() => match delivery {
                Some(Ok(channels)) => {
                    if let Some(summary) = channels
                        .first()
                        .and_then(|c| ChatSummary::from_channel(c, session.me()))
                    {
                        print_summary(&summary);
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "chat list subscription ended");
                    return Err(e.into());
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}
