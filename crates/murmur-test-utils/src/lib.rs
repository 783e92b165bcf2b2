// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Murmur integration tests: mock mesh link, mock AI
//! provider, and an end-to-end engine harness.

pub mod harness;
pub mod mock_link;
pub mod mock_provider;

pub use harness::{broadcast, direct, TestHarness, TestHarnessBuilder};
pub use mock_link::MockLink;
pub use mock_provider::MockProvider;
