//! # Skin Analyzer Telegram Bot
//!
//! A Telegram bot that runs uploaded skin photos through a YOLO object
//! detector and replies with the annotated image and a list of possible
//! conditions with their confidences.

pub mod bot;
pub mod config;
pub mod detector;
pub mod localization;
pub mod logging;
pub mod session;
