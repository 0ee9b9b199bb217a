#![no_std]

// Shared logic for the timer-multiplexed servo driver.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware access goes through the traits in `hal`; the
// firmware and the emulator supply the concrete pins, timer and delay.

pub mod channels;
pub mod hal;
pub mod handle;
pub mod mapping;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
