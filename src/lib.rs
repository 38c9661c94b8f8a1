// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod cache;
pub mod cfg;
pub mod client;
pub mod handlers;
pub mod hss;
pub mod kdf;
pub mod models;
pub mod state_machine;
pub mod utils;
