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

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use dubbo_logger::tracing::debug;
use thiserror::Error;

pub type ExtensionFactory<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    #[error("no {kind} extension named '{name}'")]
    NotFound { kind: &'static str, name: String },
}

/// Named implementations of one extension point.
///
/// Factories are registered by name and instantiated lazily; the first `load` of a name
/// caches the instance so every later caller shares it.
pub struct ExtensionDirectory<T: ?Sized> {
    kind: &'static str,
    factories: DashMap<String, ExtensionFactory<T>>,
    instances: DashMap<String, Arc<T>>,
}

impl<T: ?Sized + Send + Sync> ExtensionDirectory<T> {
    pub fn new(kind: &'static str) -> Self {
        ExtensionDirectory {
            kind,
            factories: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        debug!("register {} extension: {}", self.kind, name);
        self.instances.remove(name);
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Registers an already built instance.
    pub fn register_instance(&self, name: &str, instance: Arc<T>) {
        debug!("register {} extension instance: {}", self.kind, name);
        self.factories.remove(name);
        self.instances.insert(name.to_string(), instance);
    }

    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        self.factories.remove(name);
        self.instances.remove(name).map(|(_, instance)| instance)
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.instances.contains_key(name) || self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.instances.iter().map(|entry| entry.key().clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn load(&self, name: &str) -> Result<Arc<T>, ExtensionError> {
        if let Some(instance) = self.instances.get(name) {
            return Ok(instance.value().clone());
        }
        let factory = self
            .factories
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ExtensionError::NotFound {
                kind: self.kind,
                name: name.to_string(),
            })?;
        let instance = self
            .instances
            .entry(name.to_string())
            .or_insert_with(|| (*factory)())
            .value()
            .clone();
        Ok(instance)
    }

    /// Every instance created so far.
    pub fn loaded(&self) -> Vec<Arc<T>> {
        self.instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl<T: ?Sized> fmt::Debug for ExtensionDirectory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDirectory")
            .field("kind", &self.kind)
            .field("factories", &self.factories.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::{ExtensionDirectory, ExtensionError};

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_load_caches_instance() {
        let created = Arc::new(AtomicUsize::new(0));
        let directory: ExtensionDirectory<dyn Greeter> = ExtensionDirectory::new("greeter");
        let counter = created.clone();
        directory.register("en", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(English) as Arc<dyn Greeter>
        });

        let first = directory.load("en").unwrap();
        let second = directory.load("en").unwrap();
        assert_eq!(first.greet(), "hello");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(directory.names(), vec!["en".to_string()]);
    }

    #[test]
    fn test_unknown_name() {
        let directory: ExtensionDirectory<dyn Greeter> = ExtensionDirectory::new("greeter");
        assert_eq!(
            directory.load("fr").err(),
            Some(ExtensionError::NotFound {
                kind: "greeter",
                name: "fr".to_string()
            })
        );
        directory.register_instance("fr", Arc::new(English));
        assert!(directory.has_extension("fr"));
        assert!(directory.remove("fr").is_some());
        assert!(!directory.has_extension("fr"));
    }
}
