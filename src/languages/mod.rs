// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod azure_policy;
