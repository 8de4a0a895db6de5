//! Pull-based encode pipeline for raw audio and video frames, with WSOLA
//! tempo scaling.
//!
//! An [`EncodeDriver`](audio::engine::EncodeDriver) pulls frames from a
//! [`FrameSource`](audio::engine::FrameSource), hands them to a
//! [`Transform`](audio::engine::Transform) and pushes the resulting packets
//! into a [`PacketSink`](audio::engine::PacketSink).

pub mod audio;
pub mod common;
pub mod configs;
