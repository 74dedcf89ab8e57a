pub mod fs;
pub mod lookup;
pub mod markdown;
pub mod net;
pub mod stats;
pub mod years;
