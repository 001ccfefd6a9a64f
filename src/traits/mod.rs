mod driver;

pub use driver::{NativeConnection, NativeDriver, NativeParam, PreparedHandle};
