//! Service registry: name -> service, guarded by one lock held only around map access.

use std::any::{type_name, Any};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::error::RegistryError;
use crate::names;
use crate::service::{Receiver, Service, ServiceMethod};

/// Resolved `Service.Method` pair.
pub type Resolved = (Arc<Service>, Arc<ServiceMethod>);

/// Catalogue of registered services. Append-only: there is no deregistration.
#[derive(Default)]
pub struct ServiceMap {
    services: RwLock<HashMap<String, Arc<Service>>>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Service>>> {
        self.services.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Service>>> {
        self.services.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `receiver` under `name`, or under its type name when `name` is empty.
    ///
    /// Methods whose name is not exported, or whose argument or reply type is neither
    /// exported nor built in, are skipped. Nothing is stored on error.
    pub fn register<T: Receiver>(&self, receiver: Arc<T>, name: &str) -> Result<(), RegistryError> {
        let receiver_type = type_name::<T>();
        let name = if name.is_empty() {
            let derived = names::short_type_name(receiver_type);
            if !names::is_exported(derived) {
                return Err(RegistryError::NotExported(derived.to_owned()));
            }
            derived.to_owned()
        } else {
            name.to_owned()
        };
        if name.is_empty() {
            return Err(RegistryError::NoName(receiver_type.to_owned()));
        }

        let mut methods = HashMap::new();
        for spec in T::methods() {
            let method = spec.into_method();
            if !names::is_exported(method.name()) {
                debug!(service = %name, method = method.name(), "skipping unexported method");
                continue;
            }
            let args = method.args_shape().type_name();
            let reply = method.reply_shape().type_name();
            if !names::is_exported_or_builtin(args) || !names::is_exported_or_builtin(reply) {
                debug!(service = %name, method = method.name(), args, reply, "skipping method with unexported types");
                continue;
            }
            methods.insert(method.name().to_owned(), Arc::new(method));
        }
        if methods.is_empty() {
            return Err(RegistryError::NoSuitableMethods(name));
        }

        let method_count = methods.len();
        let receiver: Arc<dyn Any + Send + Sync> = receiver;
        let service = Arc::new(Service::new(name.clone(), receiver, receiver_type, methods));
        match self.write().entry(name) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyDefined(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(service = %entry.key(), methods = method_count, "registered service");
                entry.insert(service);
                Ok(())
            }
        }
    }

    /// Resolve a dotted `Service.Method` name.
    pub fn get(&self, method: &str) -> Result<Resolved, RegistryError> {
        let (service_name, method_name) = names::split_method(method)
            .ok_or_else(|| RegistryError::IllFormed(method.to_owned()))?;
        let service = self
            .read()
            .get(service_name)
            .cloned()
            .ok_or_else(|| RegistryError::ServiceNotFound(method.to_owned()))?;
        let found = service
            .method(method_name)
            .cloned()
            .ok_or_else(|| RegistryError::MethodNotFound(method.to_owned()))?;
        Ok((service, found))
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.get(method).is_ok()
    }

    /// Snapshot of every registered service.
    pub fn list_all(&self) -> HashMap<String, Arc<Service>> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MethodSpec;
    use crate::RequestContext;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Deserialize, Serialize)]
    struct Text {
        value: String,
    }

    #[allow(non_camel_case_types)]
    #[derive(Debug, Default, Deserialize, Serialize)]
    struct hidden {
        value: String,
    }

    struct Echo;

    impl Receiver for Echo {
        fn methods() -> Vec<MethodSpec<Self>> {
            vec![
                MethodSpec::new("Echo", |_: &Echo, _: &RequestContext, args: &mut Text, reply: &mut Text| {
                    reply.value = args.value.clone();
                    Ok::<(), String>(())
                }),
                MethodSpec::new("lower", |_: &Echo, _: &RequestContext, _: &mut Text, _: &mut Text| {
                    Ok::<(), String>(())
                }),
            ]
        }
    }

    struct Hidden;

    impl Receiver for Hidden {
        fn methods() -> Vec<MethodSpec<Self>> {
            vec![
                MethodSpec::new("Peek", |_: &Hidden, _: &RequestContext, _: &mut hidden, _: &mut Text| {
                    Ok::<(), String>(())
                }),
                MethodSpec::new("Poke", |_: &Hidden, _: &RequestContext, _: &mut Text, _: &mut hidden| {
                    Ok::<(), String>(())
                }),
            ]
        }
    }

    #[allow(non_camel_case_types)]
    struct lowercase;

    impl Receiver for lowercase {
        fn methods() -> Vec<MethodSpec<Self>> {
            vec![MethodSpec::new("Echo", |_: &lowercase, _: &RequestContext, _: &mut Text, _: &mut Text| {
                Ok::<(), String>(())
            })]
        }
    }

    #[test]
    fn register_derives_name_and_filters_methods() {
        let map = ServiceMap::new();
        map.register(Arc::new(Echo), "").unwrap();
        assert!(map.has_method("Echo.Echo"));
        assert!(!map.has_method("Echo.lower"));
        let (service, method) = map.get("Echo.Echo").unwrap();
        assert_eq!(service.name(), "Echo");
        assert_eq!(method.name(), "Echo");
        assert_eq!(service.method_names(), vec!["Echo"]);
    }

    #[test]
    fn explicit_name_wins() {
        let map = ServiceMap::new();
        map.register(Arc::new(Echo), "Mirror").unwrap();
        assert!(map.has_method("Mirror.Echo"));
        assert!(!map.has_method("Echo.Echo"));
    }

    #[test]
    fn unexported_type_rejected() {
        let map = ServiceMap::new();
        assert_eq!(
            map.register(Arc::new(lowercase), ""),
            Err(RegistryError::NotExported("lowercase".into()))
        );
        map.register(Arc::new(lowercase), "Lower").unwrap();
        assert!(map.has_method("Lower.Echo"));
    }

    #[test]
    fn no_suitable_methods_rejected() {
        let map = ServiceMap::new();
        assert_eq!(
            map.register(Arc::new(Hidden), ""),
            Err(RegistryError::NoSuitableMethods("Hidden".into()))
        );
        assert!(map.list_all().is_empty());
    }

    #[test]
    fn duplicate_name_rejected_first_kept() {
        let map = ServiceMap::new();
        map.register(Arc::new(Echo), "").unwrap();
        let first = map.get("Echo.Echo").unwrap().0;
        assert_eq!(
            map.register(Arc::new(lowercase), "Echo"),
            Err(RegistryError::AlreadyDefined("Echo".into()))
        );
        let after = map.get("Echo.Echo").unwrap().0;
        assert!(Arc::ptr_eq(&first, &after));
        assert!(after.receiver_type().ends_with("Echo"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn get_errors() {
        let map = ServiceMap::new();
        map.register(Arc::new(Echo), "").unwrap();
        assert_eq!(map.get("Echo").unwrap_err(), RegistryError::IllFormed("Echo".into()));
        assert_eq!(
            map.get("Echo.Echo.Echo").unwrap_err(),
            RegistryError::IllFormed("Echo.Echo.Echo".into())
        );
        assert_eq!(
            map.get("Nope.Echo").unwrap_err(),
            RegistryError::ServiceNotFound("Nope.Echo".into())
        );
        assert_eq!(
            map.get("Echo.Nope").unwrap_err(),
            RegistryError::MethodNotFound("Echo.Nope".into())
        );
    }

    #[test]
    fn concurrent_registration_keeps_every_service() {
        let map = ServiceMap::new();
        std::thread::scope(|s| {
            for i in 0..32 {
                let map = &map;
                s.spawn(move || map.register(Arc::new(Echo), &format!("Echo{}", i)).unwrap());
            }
        });
        assert_eq!(map.len(), 32);
        for i in 0..32 {
            assert!(map.has_method(&format!("Echo{}.Echo", i)));
        }
    }
}
