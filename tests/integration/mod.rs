//! Integration tests for the shotlist orchestration layer

mod config_integration;
mod live_session;
mod pose_fanout;
mod speech_wav;
mod storyboard_pipeline;
mod test_utils;
