// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Diameter AVP TLV codec.
pub mod avp;
/// Zh-interface client (MAR out, MAA in).
pub mod client;
/// Multimedia-Auth AVP trees.
pub mod mar;
/// Server-side MAR handling, subscriber store, loopback peer.
pub mod server;
