/// The number of comma-separated identifiers, as an integer literal sum so
/// that it takes on whatever integer type the context asks for.
#[macro_export]
macro_rules! count_args {
    (@one $arg:ident) => { 1 };
    ($($arg:ident),*) => { 0 $(+ $crate::count_args!(@one $arg))* };
}
