pub mod corpus_loader;
pub mod frame_queue;
pub mod gesture_classifier;
pub mod gesture_profile;
pub mod gesture_stabilizer;
pub mod moving_average;
pub mod pipeline;
pub mod types;
