/// This module contains logic for classifying store failures as conflicts.
pub mod detection;
/// This module contains the caller-selected conflict tolerance.
pub mod resolution;
