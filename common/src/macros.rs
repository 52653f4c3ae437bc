/// Build a `PathBuf` out of its components.
///
/// ```
/// use std::path::PathBuf;
/// use simdrone_common::makepath;
///
/// let p: PathBuf = makepath!("/tmp", "simdrone", "tube.csv");
/// assert_eq!(PathBuf::from("/tmp/simdrone/tube.csv"), p);
/// ```
#[macro_export]
macro_rules! makepath {
    ($($item:expr),+) => {
        [
        $(::std::path::PathBuf::from($item),)+
        ]
        .iter()
        .collect::<::std::path::PathBuf>()
    };
}
