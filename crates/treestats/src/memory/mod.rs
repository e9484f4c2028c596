// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory resource tree for tests and the command line

mod fixture;
mod tree;

pub use fixture::{
    ProjectFixture, StoreFixture, TranslationProjectFixture, TreeFixture, VirtualFolderFixture,
};
pub use tree::{MemoryTree, StoreData};
