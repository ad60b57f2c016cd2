/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::{borrow::Cow, str::FromStr};

use crate::{url::UrlParam, StdError};

/// `check`: whether a missing provider fails `refer`.
pub struct Check(bool);

impl Check {
    pub fn new(check: bool) -> Self {
        Self(check)
    }
}

impl UrlParam for Check {
    type TargetType = bool;

    fn name() -> &'static str {
        "check"
    }

    fn value(&self) -> Self::TargetType {
        self.0
    }

    fn as_str(&self) -> Cow<str> {
        if self.0 {
            Cow::Borrowed("true")
        } else {
            Cow::Borrowed("false")
        }
    }
}

impl FromStr for Check {
    type Err = StdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse::<bool>()?))
    }
}

impl Default for Check {
    fn default() -> Self {
        Self(true)
    }
}
