mod fmt;

pub use self::fmt::*;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type BoxedErrorResult<T> = std::result::Result<T, BoxedError>;

pub trait BoxedResultExt<T> {
    /// Erase the error type into a [`BoxedError`].
    fn boxed(self) -> BoxedErrorResult<T>;
}

impl<T, E> BoxedResultExt<T> for std::result::Result<T, E>
where
    E: Into<BoxedError>,
{
    fn boxed(self) -> BoxedErrorResult<T> {
        self.map_err(Into::into)
    }
}
