// SPDX-License-Identifier: MIT

pub mod credentials;
pub mod extractor;
pub mod generator;
pub mod git;
pub mod hook;
pub mod llm;
pub mod template;
