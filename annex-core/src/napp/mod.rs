pub mod index;
pub mod scancount;
pub mod search;
pub mod signature;

pub use index::NappIndex;
pub use scancount::scan_count;
pub use search::{intersect, IntersectionAlgorithm};
