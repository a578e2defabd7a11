//! Batched, validated movement of metadata from one store to another.
//!
//! A transfer never aborts on a bad field: each field is resolved, checked,
//! rebuilt from the source and written to the target on its own, and every
//! problem becomes a [`Message`]. Internal errors are the exception: the
//! first one stops validation and is returned by `process`. The target is
//! persisted once, after all fields.
//!
//! ```no_run
//! # use std::rc::Rc;
//! # use pagemeta_core::{*, store::share};
//! # fn demo(resource: Rc<Resource>, form: FormSubmissionStore) -> Result<()> {
//! let names: Vec<String> = form.keys().map(str::to_owned).collect();
//! let native = share(NativeDocumentStore::in_memory());
//! let outcome = Transfer::new(resource, share(form), native)
//!   .with_names(names)
//!   .validate()
//!   .process()?;
//! for message in outcome.messages() {
//!   println!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

use std::{marker::PhantomData, rc::Rc};

use crate::{
  Error, Result, fields,
  message::{Level, Message},
  metadata::MetadataValue,
  resource::Resource,
  store::StoreHandle,
};

/// What to transfer.
#[derive(Debug)]
pub enum TransferInput {
  /// Field names (current, legacy or column names), in processing order.
  Names(Vec<String>),
  /// Values already built; they are written as they are.
  Values(Vec<MetadataValue>),
}

/// Typestate: fields not yet resolved.
#[derive(Debug)]
pub enum Unvalidated {}

/// Typestate: the storable fields are known.
#[derive(Debug)]
pub enum Validated {}

pub struct Transfer<S = Unvalidated> {
  resource: Rc<Resource>,
  source:   StoreHandle,
  target:   StoreHandle,
  input:    TransferInput,
  storable: Vec<MetadataValue>,
  messages: Vec<Message>,
  fatal:    Option<Error>,
  _state:   PhantomData<S>,
}

/// The result of a processed transfer.
#[derive(Debug)]
pub struct TransferOutcome {
  pub transferred: Vec<MetadataValue>,
  messages:        Vec<Message>,
}

impl TransferOutcome {
  /// All messages, in field order.
  pub fn messages(&self) -> &[Message] { &self.messages }

  pub fn errors(&self) -> impl Iterator<Item = &Message> {
    self.messages.iter().filter(|m| m.level == Level::Error)
  }

  pub fn warnings(&self) -> impl Iterator<Item = &Message> {
    self.messages.iter().filter(|m| m.level == Level::Warning)
  }

  pub fn has_errors(&self) -> bool { self.errors().next().is_some() }

  pub fn transferred_names(&self) -> Vec<&'static str> {
    self.transferred.iter().map(MetadataValue::name).collect()
  }
}

impl Transfer<Unvalidated> {
  pub fn new(resource: Rc<Resource>, source: StoreHandle, target: StoreHandle) -> Self {
    Self {
      resource,
      source,
      target,
      input: TransferInput::Names(Vec::new()),
      storable: Vec::new(),
      messages: Vec::new(),
      fatal: None,
      _state: PhantomData,
    }
  }

  pub fn with_names<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.input = TransferInput::Names(names.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_values(mut self, values: Vec<MetadataValue>) -> Self {
    self.input = TransferInput::Values(values);
    self
  }

  /// Resolve, filter and rebuild every field of the input, collecting
  /// messages for those that cannot be stored.
  pub fn validate(mut self) -> Transfer<Validated> {
    let input = std::mem::replace(&mut self.input, TransferInput::Names(Vec::new()));
    match input {
      TransferInput::Names(names) => {
        for name in names {
          match self.prepare_name(&name) {
            Ok(Some(value)) => self.storable.push(value),
            Ok(None) => {}
            Err(e) => {
              self.fatal = Some(e);
              break;
            }
          }
        }
      }
      TransferInput::Values(values) => {
        for value in values {
          if self.admissible(value.name(), value.descriptor().is_derived()) {
            self.storable.push(value);
          }
        }
      }
    }
    tracing::debug!(
      path = self.resource.path(),
      storable = self.storable.len(),
      messages = self.messages.len(),
      "validated transfer"
    );

    Transfer {
      resource: self.resource,
      source:   self.source,
      target:   self.target,
      input:    TransferInput::Names(Vec::new()),
      storable: self.storable,
      messages: self.messages,
      fatal:    self.fatal,
      _state:   PhantomData,
    }
  }

  fn prepare_name(&mut self, name: &str) -> Result<Option<MetadataValue>> {
    let registry = self.resource.context().registry();
    let descriptor = match registry.resolve(name) {
      Ok(descriptor) => descriptor,
      Err(e) => {
        self.messages.push(Message::warning(Some(name), e.to_string()));
        return Ok(None);
      }
    };

    // Several column names fold into one tabular field.
    if self.storable.iter().any(|v| v.name() == descriptor.name)
      || self.messages.iter().any(|m| m.field.as_deref() == Some(descriptor.name))
    {
      return Ok(None);
    }
    if !fields::is_modifiable(descriptor.name) {
      self.messages.push(Message::warning(
        Some(descriptor.name),
        "this field cannot be modified",
      ));
      return Ok(None);
    }

    let mut value = MetadataValue::new(descriptor, Rc::clone(&self.resource))
      .bind(self.source.clone(), self.target.clone());
    match value.rebuild() {
      Ok(()) => {}
      Err(e) if e.is_fatal() => return Err(e),
      Err(e) => {
        self.messages.push(Message::error(Some(descriptor.name), e.to_string()));
        return Ok(None);
      }
    }

    Ok(self.admissible(descriptor.name, descriptor.is_derived()).then_some(value))
  }

  fn admissible(&mut self, name: &str, derived: bool) -> bool {
    if !fields::is_modifiable(name) {
      self
        .messages
        .push(Message::warning(Some(name), "this field cannot be modified"));
      return false;
    }
    if derived {
      self.messages.push(Message::warning(
        Some(name),
        "this field is derived and cannot be stored",
      ));
      return false;
    }
    true
  }
}

impl Transfer<Validated> {
  /// Already validated.
  pub fn validate(self) -> Self { self }

  /// Names of the fields that will be written.
  pub fn storable_names(&self) -> Vec<&'static str> {
    self.storable.iter().map(MetadataValue::name).collect()
  }

  /// Write every storable field to the target and persist it once. Only
  /// internal errors abort the transfer, including one raised while
  /// validating; nothing is written then.
  pub fn process(mut self) -> Result<TransferOutcome> {
    if let Some(e) = self.fatal.take() {
      return Err(e);
    }
    let mut transferred = Vec::with_capacity(self.storable.len());
    for mut value in std::mem::take(&mut self.storable) {
      value.set_write_store(self.target.clone());
      match value.send_to_write_store() {
        Ok(()) => transferred.push(value),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
          tracing::warn!(
            field = value.name(),
            path = self.resource.path(),
            error = %e,
            "field not transferred"
          );
          self.messages.push(Message::error(Some(value.name()), e.to_string()));
        }
      }
    }

    if let Err(e) = self.target.borrow_mut().persist() {
      if e.is_fatal() {
        return Err(e);
      }
      tracing::warn!(path = self.resource.path(), error = %e, "target store not persisted");
      self.messages.push(Message::error(None, e.to_string()));
    }

    tracing::debug!(
      path = self.resource.path(),
      transferred = transferred.len(),
      messages = self.messages.len(),
      "processed transfer"
    );
    Ok(TransferOutcome { transferred, messages: self.messages })
  }
}

impl<S> std::fmt::Debug for Transfer<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Transfer")
      .field("resource", &self.resource.path())
      .field("storable", &self.storable)
      .field("messages", &self.messages)
      .field("fatal", &self.fatal)
      .finish_non_exhaustive()
  }
}
