/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The service could not be reached, or its response could not be
    /// understood.
    Unavailable,
    /// Any other errors.
    Other,
}
