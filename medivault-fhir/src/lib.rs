pub mod bundle;
pub mod codes;
pub mod entries;

pub use bundle::{BundleBuilder, BundleInput};
pub use entries::ClinicalEntry;
