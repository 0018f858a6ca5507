//! # Teacher Poll Telegram Bot
//!
//! A Telegram bot that collects student feedback about teachers.
//! Students open a deep link for a teacher and group, pick the teacher's
//! role, rate the questions through inline keyboards and finish with an
//! optional free-text answer.

pub mod bot;
pub mod collaborators;
pub mod config;
pub mod db;
pub mod deep_link;
pub mod dialogue;
pub mod keyboard;
pub mod localization;
pub mod poll_errors;
pub mod poll_model;
pub mod poll_service;
pub mod state_machine;
