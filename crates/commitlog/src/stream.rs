mod writer;
pub use writer::{OnTrailingData, StreamWriter};

mod reader;
pub use reader::{commits, retain_range};

mod common;
pub use common::{AsyncFsync, AsyncLen, AsyncRepo, IntoAsyncWriter, RangeFromMaybeToInclusive};
