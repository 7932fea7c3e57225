// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound integrations.

pub mod chat_completions;

pub use chat_completions::{ChatCompletionsClient, ChatError, ChatSettings};
