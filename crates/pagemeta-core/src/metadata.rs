//! [`MetadataValue`]: one field of one resource, bound to its stores.
//!
//! A value is built lazily from its read store on first access and cached
//! until it is invalidated, replaced through [`MetadataValue::set_value`] or
//! rebound to another read store. Writes go through
//! [`MetadataValue::send_to_write_store`], which encodes the value for the
//! write store's [`StoreKind`].

use std::rc::Rc;

use serde_json::Value;

use crate::{
  Error, Result, codec,
  descriptor::{DefaultRule, MetadataDescriptor, NativeShape},
  fields,
  resource::Resource,
  store::{StoreHandle, StoreKind},
  tabular,
  value::{Origin, TypedValue},
};

/// Lifecycle of the cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
  Unbuilt,
  Building,
  Built,
}

pub struct MetadataValue {
  pub(crate) descriptor:  &'static MetadataDescriptor,
  pub(crate) resource:    Rc<Resource>,
  pub(crate) read_store:  Option<StoreHandle>,
  pub(crate) write_store: Option<StoreHandle>,
  pub(crate) state:       BuildState,
  pub(crate) value:       Option<TypedValue>,
  pub(crate) origin:      Option<Origin>,
  /// A persisted system-computed value, used when no default can be
  /// derived.
  pub(crate) fallback:    Option<TypedValue>,
  pub(crate) dirty:       bool,
}

impl MetadataValue {
  /// An unbound value.
  pub fn new(descriptor: &'static MetadataDescriptor, resource: Rc<Resource>) -> Self {
    Self {
      descriptor,
      resource,
      read_store: None,
      write_store: None,
      state: BuildState::Unbuilt,
      value: None,
      origin: None,
      fallback: None,
      dirty: false,
    }
  }

  /// Read from and write to `store`.
  pub fn with_store(self, store: StoreHandle) -> Self {
    self.bind(store.clone(), store)
  }

  pub fn bind(mut self, read: StoreHandle, write: StoreHandle) -> Self {
    self.set_read_store(read);
    self.write_store = Some(write);
    self
  }

  /// Switching the read store drops the cached value.
  pub fn set_read_store(&mut self, store: StoreHandle) {
    self.read_store = Some(store);
    self.invalidate();
  }

  pub fn set_write_store(&mut self, store: StoreHandle) { self.write_store = Some(store); }

  pub fn descriptor(&self) -> &'static MetadataDescriptor { self.descriptor }

  pub fn name(&self) -> &'static str { self.descriptor.name }

  pub fn resource(&self) -> &Rc<Resource> { &self.resource }

  pub fn state(&self) -> BuildState { self.state }

  /// Set since the last write to the write store.
  pub fn is_dirty(&self) -> bool { self.dirty }

  /// Provenance of the persisted value, for fields that track it.
  pub fn origin(&self) -> Option<Origin> { self.origin }

  pub fn invalidate(&mut self) {
    self.state = BuildState::Unbuilt;
    self.value = None;
    self.origin = None;
    self.fallback = None;
    self.dirty = false;
  }

  fn read_kind(&self) -> Option<StoreKind> {
    self.read_store.as_ref().map(|s| s.borrow().kind())
  }

  // ── Build ─────────────────────────────────────────────────────────────────

  /// Build the cached value from the read store, once. Decode and
  /// validation errors are returned; a build re-entered while running is
  /// an internal error.
  pub fn build_from_read_store(&mut self) -> Result<()> {
    match self.state {
      BuildState::Built => return Ok(()),
      BuildState::Building => {
        return Err(Error::Internal(format!(
          "{} read while being built",
          self.descriptor.name
        )));
      }
      BuildState::Unbuilt => {}
    }

    let resource = Rc::clone(&self.resource);
    let _guard = resource.enter_build(self.descriptor.name)?;
    self.state = BuildState::Building;

    match self.load() {
      Ok(()) => {
        self.state = BuildState::Built;
        tracing::debug!(
          field = self.descriptor.name,
          path = resource.path(),
          present = self.value.is_some(),
          "built metadata"
        );
        Ok(())
      }
      Err(e) => {
        self.invalidate();
        Err(e)
      }
    }
  }

  /// Drop the cached value and build again from the read store.
  pub fn rebuild(&mut self) -> Result<()> {
    self.invalidate();
    self.build_from_read_store()
  }

  fn load(&mut self) -> Result<()> {
    let Some(store) = self.read_store.clone() else {
      return Ok(());
    };
    let kind = store.borrow().kind();
    let raw = store.borrow().get(self.descriptor)?;

    let Some(raw) = raw else {
      if kind == StoreKind::NativeDocument && self.descriptor.legacy_rows {
        self.value = self.migrate_legacy_rows(&store)?;
      }
      return Ok(());
    };

    let (inner, origin) = codec::split_provenance(self.descriptor, &raw, kind);
    let decoded = match inner {
      Some(inner) => codec::decode(self.descriptor, inner, kind)?,
      None => None,
    };
    if let Some(value) = &decoded {
      self.descriptor.check(value, self.resource.context())?;
    }

    self.origin = origin;
    if origin == Some(Origin::System) {
      self.fallback = decoded;
    } else {
      self.value = decoded;
    }
    Ok(())
  }

  /// Build, treating unreadable persisted values as absent.
  pub(crate) fn ensure_built(&mut self) -> Result<()> {
    match self.build_from_read_store() {
      Ok(()) => Ok(()),
      Err(e) if e.is_fatal() => Err(e),
      Err(e) => {
        tracing::warn!(
          field = self.descriptor.name,
          path = self.resource.path(),
          error = %e,
          "ignoring unreadable metadata value"
        );
        self.state = BuildState::Built;
        Ok(())
      }
    }
  }

  /// Move rows of this field out of the deprecated relational table into
  /// the native document, once.
  fn migrate_legacy_rows(&self, native: &StoreHandle) -> Result<Option<TypedValue>> {
    let context = self.resource.context();
    let Some(legacy) = context.legacy_store() else {
      return Ok(None);
    };
    let name = self.descriptor.name;

    let canonical = native
      .borrow()
      .get(&fields::CANONICAL)?
      .and_then(|v| v.as_str().map(str::to_owned))
      .filter(|c| !c.is_empty())
      .unwrap_or_else(|| self.resource.path().to_owned());

    let rows = match legacy.select_legacy(name, &canonical) {
      Ok(rows) => rows,
      Err(e) => {
        tracing::warn!(field = name, %canonical, error = %e, "legacy rows unreadable");
        return Ok(None);
      }
    };
    if rows.is_empty() {
      return Ok(None);
    }

    let table =
      tabular::decode(self.descriptor, &Value::Array(rows), StoreKind::Relational)?;
    if table.is_empty() {
      return Ok(None);
    }
    let count = table.len();
    let value = TypedValue::Table(table);
    self.descriptor.check(&value, context)?;

    let raw = codec::encode(self.descriptor, &value, StoreKind::NativeDocument)?;
    {
      let mut store = native.borrow_mut();
      store.set(self.descriptor, raw)?;
      store.persist()?;
    }
    tracing::info!(field = name, %canonical, rows = count, "migrated legacy rows");

    if let Err(e) = legacy.delete_legacy(name, &canonical) {
      tracing::warn!(
        field = name,
        %canonical,
        error = %e,
        "legacy rows migrated but not deleted"
      );
    }
    Ok(Some(value))
  }

  // ── Read ──────────────────────────────────────────────────────────────────

  /// The value, built on first access, else the field default.
  pub fn get(&mut self) -> Result<Option<TypedValue>> {
    self.ensure_built()?;
    match &self.value {
      Some(value) => Ok(Some(value.clone())),
      None => self.default_value(),
    }
  }

  /// The value this field falls back to when nothing is stored.
  pub fn default_value(&self) -> Result<Option<TypedValue>> {
    let resource = &self.resource;
    let derived = match self.descriptor.default_rule {
      DefaultRule::None => None,
      DefaultRule::Text(s) => Some(TypedValue::text(s)),
      DefaultRule::Boolean(b) => Some(TypedValue::Boolean(b)),
      DefaultRule::Integer(i) => Some(TypedValue::Integer(i)),
      DefaultRule::List(items) => Some(TypedValue::list(items.iter().copied())),
      DefaultRule::Computed(compute) => compute(resource),
      DefaultRule::Field(other) => {
        let _guard = resource.enter_build(self.descriptor.name)?;
        let mut other = resource
          .context()
          .registry()
          .create(other, Rc::clone(resource))
          .map_err(|e| {
            Error::Internal(format!(
              "default of {} refers to {other}: {e}",
              self.descriptor.name
            ))
          })?;
        if let Some(store) = &self.read_store {
          other.set_read_store(store.clone());
        }
        other.get()?
      }
    };
    Ok(derived.filter(|v| !v.is_empty()).or_else(|| self.fallback.clone()))
  }

  // ── Write ─────────────────────────────────────────────────────────────────

  /// Validate and replace the value. Clearing a provenance-tracked field
  /// read from the native store is an error when the stored value came from
  /// a user, and is ignored otherwise.
  pub fn set_value(&mut self, value: Option<TypedValue>) -> Result<()> {
    let value = value.filter(|v| !v.is_empty());
    if let Some(value) = &value {
      self.descriptor.check(value, self.resource.context())?;
    }

    if value.is_none()
      && matches!(self.descriptor.native_shape, NativeShape::Provenance { .. })
      && self.read_kind() == Some(StoreKind::NativeDocument)
    {
      self.ensure_built()?;
      if self.origin == Some(Origin::User) {
        return Err(Error::bad_argument(self.descriptor.name, "cannot be empty"));
      }
      return Ok(());
    }

    let origin = value.as_ref().map(|_| Origin::User);
    self.replace_value(value);
    self.origin = origin;
    Ok(())
  }

  /// Decode a raw value as a store of `kind` would hold it, then
  /// [`set_value`](Self::set_value).
  pub fn set_from_store_value(&mut self, raw: Option<&Value>, kind: StoreKind) -> Result<()> {
    let decoded = match raw {
      Some(raw) => match codec::split_provenance(self.descriptor, raw, kind) {
        (Some(inner), _) => codec::decode(self.descriptor, inner, kind)?,
        (None, _) => None,
      },
      None => None,
    };
    self.set_value(decoded)
  }

  pub(crate) fn replace_value(&mut self, value: Option<TypedValue>) {
    self.value = value;
    self.state = BuildState::Built;
    self.dirty = true;
  }

  /// The raw representation of the current value for a store of `kind`.
  pub fn to_store_value(&self, kind: StoreKind) -> Result<Option<Value>> {
    let encoded = match &self.value {
      Some(value) => codec::encode(self.descriptor, value, kind)?,
      None => None,
    };

    let tracks_origin =
      matches!(self.descriptor.native_shape, NativeShape::Provenance { .. });
    if !tracks_origin || kind != StoreKind::NativeDocument {
      return Ok(encoded);
    }

    match encoded {
      Some(raw) => {
        let origin = self
          .origin
          .filter(|o| *o != Origin::System)
          .unwrap_or(Origin::User);
        Ok(Some(codec::join_provenance(self.descriptor, raw, origin)))
      }
      None => {
        let default = match self.default_value()? {
          Some(default) => codec::encode(self.descriptor, &default, kind)?,
          None => None,
        };
        Ok(default.map(|raw| codec::join_provenance(self.descriptor, raw, Origin::System)))
      }
    }
  }

  /// Encode the value for the write store and hand it over. The store
  /// decides when the write becomes durable (see
  /// [`MetadataStore::persist`](crate::store::MetadataStore::persist)).
  pub fn send_to_write_store(&mut self) -> Result<()> {
    let Some(store) = self.write_store.clone() else {
      return Err(Error::Internal(format!(
        "{} has no write store",
        self.descriptor.name
      )));
    };
    let kind = store.borrow().kind();
    let raw = self.to_store_value(kind)?;
    store.borrow_mut().set(self.descriptor, raw)?;
    self.dirty = false;
    tracing::debug!(
      field = self.descriptor.name,
      path = self.resource.path(),
      store = kind.as_str(),
      "sent metadata to store"
    );
    Ok(())
  }
}

impl std::fmt::Debug for MetadataValue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MetadataValue")
      .field("field", &self.descriptor.name)
      .field("path", &self.resource.path())
      .field("state", &self.state)
      .field("value", &self.value)
      .field("origin", &self.origin)
      .finish_non_exhaustive()
  }
}
