use std::{fmt::Debug, future::Future};

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{INGREDIENT_CACHE_BIND, TAG_CACHE_BIND},
    error::CacheError,
};

// Caching - keys

/// Cached lists are stored under `<kind>-<name>`.
#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }

    pub fn lifetime(&self) -> CacheLifetime {
        match self._type {
            CacheKeyType::Tags => CacheLifetime::BindTagCache,
            CacheKeyType::Ingredients => CacheLifetime::BindIngredientCache,
        }
    }
}

impl<T: ToString + Serialize> std::fmt::Display for CacheKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self._type {
            CacheKeyType::Tags => write!(f, "tags-{}", self._value.to_string()),
            CacheKeyType::Ingredients => write!(f, "ingredients-{}", self._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum CacheKeyType {
    Tags,
    Ingredients,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

// Cache - wrappers

/// A cached value stays valid while the bind key it was stored under is
/// unchanged. Rotating the bind key invalidates every value bound to it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum CacheLifetime {
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    fn bind_key(&self) -> &'static str {
        match self {
            CacheLifetime::BindTagCache => TAG_CACHE_BIND,
            CacheLifetime::BindIngredientCache => INGREDIENT_CACHE_BIND,
        }
    }

    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, potion::Error> {
        get_cache_value::<&str, String>(self.bind_key(), cache).await
    }

    /// Rotates the bind key so every value stored under it goes stale.
    pub async fn invalidate(&self, cache: &mut MultiplexedConnection) -> Result<(), potion::Error> {
        let key = self.bind_key();
        log::trace!("> Rotating {key}");
        set_cache_value(key, uuid::Uuid::new_v4().to_string(), cache).await
    }
}

#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, potion::Error> {
        let bind = lifetime.get_cache_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    async fn is_current(&self, cache: &mut MultiplexedConnection) -> Result<bool, potion::Error> {
        Ok(self._bind == self._lifetime.get_cache_bind(cache).await?)
    }

    pub async fn get_or_list<'a, F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<RedisValue<Vec<T>>, potion::Error>
    where
        Vec<T>: serde::Serialize + Send + Sync,
        K: ToString + Serialize + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, potion::Error>> + Send + 'a,
    {
        let name = key.to_string();

        // A value that no longer deserializes is dropped in the background
        let stored = get_cache_value::<&str, RedisValue<Vec<T>>>(&name, cache)
            .await
            .unwrap_or_else(|_| {
                let mut c = cache.clone();
                let stale = name.clone();
                tokio::spawn(async move {
                    log::error!("> Unreadable cache entry, deleting {stale}");
                    if let Err(e) = delete_cache_value(stale, &mut c).await {
                        log::error!("> Failed to delete cache entry: {e:?}");
                    }
                });
                None
            });

        if let Some(stored) = stored {
            if stored.is_current(cache).await? {
                log::trace!("> Hit {name}");
                return Ok(stored);
            }
            log::trace!("> Stale {name}");
        }

        log::trace!("> Fetching {name}");
        let fresh = RedisValue::new(callback().await?, key.lifetime(), cache).await?;
        if let Err(e) = set_cache_value(name.as_str(), fresh.clone(), cache).await {
            log::error!("> Failed to store {name}: {e:?}");
        }

        Ok(fresh)
    }
}

/// Lists through the cache when one is configured, straight from the
/// callback otherwise. Cache failures fall back to the callback.
pub async fn cached_list<T, F, Fut>(
    key: CacheKey<&'static str>,
    cache: Option<MultiplexedConnection>,
    callback: F,
) -> Result<Vec<T>, potion::Error>
where
    T: Serialize + Send + Sync + Clone + Debug + for<'a> Deserialize<'a>,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<Vec<T>, potion::Error>> + Send + 'static,
{
    match cache {
        Some(mut cache) => {
            match RedisValue::<T>::get_or_list(key, &mut cache, callback.clone()).await {
                Ok(cached) => Ok(cached.value),
                Err(e) => {
                    log::warn!("Cache unavailable, reading through: {e:?}");
                    callback().await
                }
            }
        }
        None => callback().await,
    }
}

pub async fn invalidate_cache(lifetime: CacheLifetime, cache: Option<MultiplexedConnection>) {
    if let Some(mut cache) = cache {
        if let Err(e) = lifetime.invalidate(&mut cache).await {
            log::error!("Failed to invalidate cache: {e:?}");
        }
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K, V>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), potion::Error>
where
    K: ToRedisArgs + Send + Sync,
    V: ToRedisArgs + Send + Sync,
{
    cache
        .set::<K, V, ()>(key, value)
        .await
        .map_err(|e| CacheError::from(e).into())
}

pub async fn delete_cache_value<K>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), potion::Error>
where
    K: ToRedisArgs + Send + Sync,
{
    cache
        .del::<K, ()>(key)
        .await
        .map_err(|e| CacheError::from(e).into())
}

pub async fn get_cache_value<K, V>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, potion::Error>
where
    K: ToRedisArgs + Send + Sync,
    V: FromRedisValue,
{
    cache
        .get::<K, Option<V>>(key)
        .await
        .map_err(|e| CacheError::from(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_type() {
        assert_eq!(CacheKeyType::Tags.new("all").to_string(), "tags-all");
        assert_eq!(
            CacheKeyType::Ingredients.new("all").to_string(),
            "ingredients-all"
        );
    }

    #[test]
    fn keys_bind_to_their_lifetime() {
        let lifetime = CacheKeyType::Tags.new("all").lifetime();
        assert_eq!(lifetime.bind_key(), TAG_CACHE_BIND);

        let lifetime = CacheKeyType::Ingredients.new("all").lifetime();
        assert_eq!(lifetime.bind_key(), INGREDIENT_CACHE_BIND);
    }
}
