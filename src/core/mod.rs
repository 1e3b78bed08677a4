// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Core types shared by every layer: values, coercion and errors

pub mod convert;
pub mod error;
pub mod value;

pub use convert::FromValue;
pub use error::{
    EvaluationError, EvaluationResult, ParseError, ParseResult, RegistryError, ResolverError,
    Result,
};
pub use value::{Value, ValueMap};
