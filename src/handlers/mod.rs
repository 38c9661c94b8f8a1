//! This module contains the HTTP-facing halves of the BSF and NAF roles.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// BSF bootstrap exchange.
pub mod bsf;
/// NAF digest exchange.
pub mod naf;
/// Accept loops and TLS material loading.
pub mod serve;
