pub mod detection;
pub mod matching;
pub mod pipeline;
pub mod shared;
pub mod tracking;
pub mod video;
