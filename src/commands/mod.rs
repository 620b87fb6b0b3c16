// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! Operator commands built on top of the cache: `rollback`, `doctor` and `cleanup`. These don't
//! touch the directory pipeline; they inspect or unwind the state it leaves behind.

pub mod cleanup;
pub mod doctor;
pub mod rollback;
