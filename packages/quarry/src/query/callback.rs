//! Escape hatches: arbitrary async code over a scope, and direct access to
//! the backend's native handles.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{FutureExt, LocalBoxFuture};

use super::{Configure, Found, Query, QueryOptions};
use crate::document::{DocumentRef, Raw, RawFn};
use crate::error::Result;
use crate::scope::Scope;
use crate::value::Value;

/// A user function over a scope of the current document.
pub type CallbackFn = Rc<dyn Fn(Scope) -> LocalBoxFuture<'static, Result<Option<Value>>>>;

/// Runs a user function with a [`Scope`] over the current document.
///
/// Whatever the function resolves to is the found value, so it still goes
/// through default substitution and formatting. Errors propagate.
#[derive(Clone)]
pub struct CallbackQuery {
    options: QueryOptions,
    f: CallbackFn,
}

impl CallbackQuery {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Scope) -> Fut + 'static,
        Fut: Future<Output = Result<Option<Value>>> + 'static,
    {
        Self::from_fn(Rc::new(move |scope| f(scope).boxed_local()))
    }

    pub fn from_fn(f: CallbackFn) -> Self {
        Self {
            options: QueryOptions::default(),
            f,
        }
    }
}

impl fmt::Debug for CallbackQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQuery")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Configure for CallbackQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for CallbackQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        let scope = Scope::new(Rc::clone(document));
        Ok((self.f)(scope).await?.map(Found::Value))
    }
}

/// Hands the backend's native store and cursor to a user function.
#[derive(Clone)]
pub struct RawQuery {
    options: QueryOptions,
    f: RawFn,
}

impl RawQuery {
    pub fn new(f: impl Fn(Raw<'_>) -> Option<Value> + 'static) -> Self {
        Self {
            options: QueryOptions::default(),
            f: Rc::new(f),
        }
    }
}

impl fmt::Debug for RawQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawQuery")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Configure for RawQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for RawQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        Ok(document.raw(&self.f).map(Found::Value))
    }
}
