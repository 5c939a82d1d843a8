use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("User id is empty")]
    Empty,

    #[error("User id is longer than {max} bytes")]
    TooLong { max: usize },

    #[error("User id contains forbidden character {0:?}")]
    ForbiddenChar(char),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairError {
    #[error("A pair needs two distinct users, got {0} twice")]
    SameUser(String),

    #[error("Malformed pair key: {0}")]
    MalformedKey(String),

    #[error("Invalid identity in pair: {0}")]
    Identity(#[from] IdentityError),
}
