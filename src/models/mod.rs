// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Authentication vector model and serialisations.
pub mod av;
/// BSF success body (BootstrappingInfo XML).
pub mod bootstrap_info;
/// B-TID and AKA nonce helpers.
pub mod btid;
/// HTTP Digest header codec.
pub mod digest;
/// Shared failure taxonomy.
pub mod errors;
