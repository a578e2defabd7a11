//! Cross-module tests: metadata values over real stores, and transfers.

use std::{
  cell::RefCell,
  collections::BTreeMap,
  rc::Rc,
};

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use crate::{
  Error, FormSubmissionStore, Level, LegacyStore, MetadataConfig, MetadataContext,
  MetadataDescriptor, MetadataStore, MetadataValue, NativeDocumentStore, Origin,
  RenderSummary, Resource, Result, Row, StoreHandle, StoreKind, Table, Transfer,
  TypedValue,
  descriptor::DefaultRule,
  fields,
  store::share,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn resource_in(context: MetadataContext, path: &str) -> Rc<Resource> {
  Rc::new(Resource::new(path, Rc::new(context)))
}

fn resource(path: &str) -> Rc<Resource> { resource_in(MetadataContext::default(), path) }

fn native() -> (Rc<RefCell<NativeDocumentStore>>, StoreHandle) {
  let store = Rc::new(RefCell::new(NativeDocumentStore::in_memory()));
  let handle: StoreHandle = store.clone();
  (store, handle)
}

/// Counts `set` calls per field and can be told to fail.
#[derive(Default)]
struct RecordingStore {
  inner:        NativeDocumentStore,
  sets:         BTreeMap<String, usize>,
  fail_set:     Option<&'static str>,
  fail_persist: bool,
  persisted:    usize,
}

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

impl MetadataStore for RecordingStore {
  fn kind(&self) -> StoreKind { StoreKind::NativeDocument }

  fn get(&self, descriptor: &MetadataDescriptor) -> Result<Option<Value>> {
    self.inner.get(descriptor)
  }

  fn set(&mut self, descriptor: &MetadataDescriptor, value: Option<Value>) -> Result<()> {
    *self.sets.entry(descriptor.name.to_owned()).or_default() += 1;
    if self.fail_set == Some(descriptor.name) {
      return Err(Error::Store(Box::new(DiskFull)));
    }
    self.inner.set(descriptor, value)
  }

  fn persist(&mut self) -> Result<()> {
    self.persisted += 1;
    if self.fail_persist {
      return Err(Error::Store(Box::new(DiskFull)));
    }
    self.inner.persist()
  }
}

fn recording() -> (Rc<RefCell<RecordingStore>>, StoreHandle) {
  let store = Rc::new(RefCell::new(RecordingStore::default()));
  let handle: StoreHandle = store.clone();
  (store, handle)
}

/// Deprecated alias rows, keyed by `(field, canonical)`.
#[derive(Default)]
struct FakeLegacy {
  rows:        RefCell<BTreeMap<(String, String), Vec<Value>>>,
  selects:     RefCell<usize>,
  fail_select: bool,
  fail_delete: bool,
}

impl FakeLegacy {
  fn with_rows(field: &str, canonical: &str, rows: Vec<Value>) -> Self {
    let legacy = Self::default();
    legacy
      .rows
      .borrow_mut()
      .insert((field.to_owned(), canonical.to_owned()), rows);
    legacy
  }

  fn is_empty(&self) -> bool { self.rows.borrow().values().all(Vec::is_empty) }
}

impl LegacyStore for FakeLegacy {
  fn select_legacy(&self, field: &str, canonical: &str) -> Result<Vec<Value>> {
    *self.selects.borrow_mut() += 1;
    if self.fail_select {
      return Err(Error::Store(Box::new(DiskFull)));
    }
    Ok(
      self
        .rows
        .borrow()
        .get(&(field.to_owned(), canonical.to_owned()))
        .cloned()
        .unwrap_or_default(),
    )
  }

  fn delete_legacy(&self, field: &str, canonical: &str) -> Result<()> {
    if self.fail_delete {
      return Err(Error::Store(Box::new(DiskFull)));
    }
    self
      .rows
      .borrow_mut()
      .remove(&(field.to_owned(), canonical.to_owned()));
    Ok(())
  }
}

// ─── Defaults and provenance ─────────────────────────────────────────────────

#[test]
fn description_defaults_to_the_abstract_without_its_heading() {
  let context = Rc::new(MetadataContext::default());
  let resource = Rc::new(
    Resource::new(":ns:page", context).with_render_summary(RenderSummary {
      abstract_text: Some("Welcome\nThis page explains things.".into()),
      heading: Some("Welcome".into()),
      modified: None,
    }),
  );
  let (_, store) = native();

  let mut description = MetadataValue::new(&fields::DESCRIPTION, resource).with_store(store);
  assert_eq!(
    description.get().unwrap(),
    Some(TypedValue::text("This page explains things."))
  );
  assert_eq!(
    description.to_store_value(StoreKind::NativeDocument).unwrap(),
    Some(json!({"value": "This page explains things.", "origin": "system"}))
  );
}

#[test]
fn user_descriptions_keep_their_origin_in_the_native_store() {
  let (store, handle) = native();
  let mut description =
    MetadataValue::new(&fields::DESCRIPTION, resource(":page")).with_store(handle);
  description.set_value(Some(TypedValue::text("Mine"))).unwrap();
  description.send_to_write_store().unwrap();

  assert_eq!(
    store.borrow().document().persistent["description"],
    json!({"value": "Mine", "origin": "user"})
  );
  // Other stores get the bare text.
  assert_eq!(
    description.to_store_value(StoreKind::Frontmatter).unwrap(),
    Some(json!("Mine"))
  );
}

#[test]
fn clearing_a_user_description_is_rejected() {
  let (store, handle) = native();
  store
    .borrow_mut()
    .set(&fields::DESCRIPTION, Some(json!({"value": "Mine", "origin": "user"})))
    .unwrap();

  let mut description =
    MetadataValue::new(&fields::DESCRIPTION, resource(":page")).with_store(handle);
  let err = description.set_value(None).unwrap_err();
  assert!(matches!(err, Error::BadArgument { ref field, .. } if field == "description"));
  assert_eq!(description.get().unwrap(), Some(TypedValue::text("Mine")));
}

#[test]
fn clearing_a_system_description_is_ignored() {
  let (store, handle) = native();
  store
    .borrow_mut()
    .set(&fields::DESCRIPTION, Some(json!({"value": "Generated", "origin": "system"})))
    .unwrap();

  let mut description =
    MetadataValue::new(&fields::DESCRIPTION, resource(":page")).with_store(handle);
  description.set_value(None).unwrap();
  assert_eq!(description.origin(), Some(Origin::System));
  // The stored system value is the fallback when nothing can be derived.
  assert_eq!(description.get().unwrap(), Some(TypedValue::text("Generated")));
  assert!(!description.is_dirty());
}

#[test]
fn h1_defaults_to_the_title() {
  let context = Rc::new(MetadataContext::default());
  let resource = Rc::new(Resource::new(":ns:some_page", context));
  let (store, handle) = native();

  let mut h1 = MetadataValue::new(&fields::H1, Rc::clone(&resource)).with_store(handle);
  assert_eq!(h1.get().unwrap(), Some(TypedValue::text("some_page")));

  store.borrow_mut().set(&fields::TITLE, Some(json!("Stored title"))).unwrap();
  h1.invalidate();
  assert_eq!(h1.get().unwrap(), Some(TypedValue::text("Stored title")));
}

// ─── Build lifecycle ─────────────────────────────────────────────────────────

static CYCLE_A: MetadataDescriptor = MetadataDescriptor {
  name: "cycle_a",
  persistent_name: "cycle_a",
  default_rule: DefaultRule::Field("cycle_b"),
  ..MetadataDescriptor::BASE
};

static CYCLE_B: MetadataDescriptor = MetadataDescriptor {
  name: "cycle_b",
  persistent_name: "cycle_b",
  default_rule: DefaultRule::Field("cycle_a"),
  ..MetadataDescriptor::BASE
};

#[test]
fn default_cycles_fail_fast() {
  let mut context = MetadataContext::default();
  context.registry_mut().register(&CYCLE_A);
  context.registry_mut().register(&CYCLE_B);
  let resource = resource_in(context, ":page");
  let (_, handle) = native();

  let mut value = MetadataValue::new(&CYCLE_A, resource).with_store(handle);
  let err = value.get().unwrap_err();
  assert!(err.is_fatal(), "{err}");
}

#[test]
fn unreadable_values_are_reported_by_a_strict_build() {
  let (store, handle) = native();
  store.borrow_mut().set(&fields::LANG, Some(json!("english"))).unwrap();

  let mut lang = MetadataValue::new(&fields::LANG, resource(":page")).with_store(handle);
  assert!(lang.build_from_read_store().unwrap_err().is_validation());
  assert_eq!(lang.state(), crate::BuildState::Unbuilt);

  // A lenient read falls back to the default.
  assert_eq!(lang.get().unwrap(), Some(TypedValue::text("en")));
}

// ─── Round trips through each store ──────────────────────────────────────────

fn samples() -> Vec<(&'static MetadataDescriptor, TypedValue)> {
  let table: Table = [
    Row::new(":b").with("alias_type", TypedValue::text("permanent")),
    Row::new(":a").with("alias_type", TypedValue::text("synonym")),
  ]
  .into_iter()
  .collect();
  vec![
    (&fields::TITLE, TypedValue::text("A title")),
    (&fields::DESCRIPTION, TypedValue::text("Line one\nline two")),
    (&fields::KEYWORDS, TypedValue::list(["wiki", "rust"])),
    (&fields::LOW_QUALITY_PAGE, TypedValue::Boolean(true)),
    (
      &fields::DATE_PUBLISHED,
      TypedValue::Date(Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap()),
    ),
    (&fields::ALIASES, TypedValue::Table(table)),
  ]
}

#[test]
fn values_survive_a_trip_through_each_store() {
  let stores: Vec<StoreHandle> = vec![
    share(NativeDocumentStore::in_memory()),
    share(FormSubmissionStore::new()),
  ];
  for store in stores {
    let kind = store.borrow().kind();
    for (descriptor, sample) in samples() {
      let r = resource(":page");
      let mut written = MetadataValue::new(descriptor, Rc::clone(&r)).with_store(store.clone());
      written.set_value(Some(sample.clone())).unwrap();
      written.send_to_write_store().unwrap();

      let mut read = MetadataValue::new(descriptor, r).with_store(store.clone());
      assert_eq!(read.get().unwrap(), Some(sample), "{} via {kind:?}", descriptor.name);
    }
  }
}

// ─── Tabular fields ──────────────────────────────────────────────────────────

#[test]
fn adding_an_existing_key_replaces_the_record_in_place() {
  let (store, handle) = native();
  let mut aliases = MetadataValue::new(&fields::ALIASES, resource(":page")).with_store(handle);

  aliases.add(":a", [("alias_type", TypedValue::text("redirect"))]).unwrap();
  aliases.add(":b", [("alias_type", TypedValue::text("synonym"))]).unwrap();
  aliases.add(":a", [("alias_type", TypedValue::text("permanent"))]).unwrap();

  let rows = aliases.rows().unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].key, ":a");
  assert_eq!(rows[0].get("alias_type"), Some(&TypedValue::text("permanent")));
  assert_eq!(rows[1].key, ":b");

  // Written through, with the default type omitted.
  assert_eq!(
    store.borrow().document().persistent["aliases"],
    json!([{"path": ":a", "type": "permanent"}, {"path": ":b"}])
  );
}

#[test]
fn removing_a_record_writes_through() {
  let (store, handle) = native();
  let mut aliases = MetadataValue::new(&fields::ALIASES, resource(":page")).with_store(handle);
  aliases.add(":a", [("alias_type", TypedValue::text("redirect"))]).unwrap();

  assert!(aliases.remove(":missing").unwrap().is_none());
  assert_eq!(aliases.remove(":a").unwrap().map(|r| r.key), Some(":a".to_owned()));
  assert!(!store.borrow().document().persistent.contains_key("aliases"));
}

#[test]
fn tabular_operations_on_scalars_are_internal_errors() {
  let (_, handle) = native();
  let mut title = MetadataValue::new(&fields::TITLE, resource(":page")).with_store(handle);
  assert!(title.rows().unwrap_err().is_fatal());
}

#[test]
fn unknown_alias_types_are_rejected_on_add() {
  let (_, handle) = native();
  let mut aliases = MetadataValue::new(&fields::ALIASES, resource(":page")).with_store(handle);
  let err = aliases
    .add(":a", [("alias_type", TypedValue::text("teleport"))])
    .unwrap_err();
  assert!(err.is_validation());
  assert!(aliases.rows().unwrap().is_empty());
}

// ─── Legacy migration ────────────────────────────────────────────────────────

#[test]
fn legacy_alias_rows_migrate_once() {
  let legacy = Rc::new(FakeLegacy::with_rows("aliases", ":ns:page", vec![
    json!({"path": ":old", "type": "redirect"}),
    json!({"path": ":older"}),
  ]));
  let context = MetadataContext::default().with_legacy_store(legacy.clone());
  let resource = resource_in(context, "ns:page");
  let (store, handle) = native();

  let mut first = MetadataValue::new(&fields::ALIASES, Rc::clone(&resource))
    .with_store(handle.clone());
  let rows = first.rows().unwrap();
  assert_eq!(rows.len(), 2);
  assert!(legacy.is_empty());
  let migrated = store.borrow().document().clone();
  assert_eq!(
    migrated.persistent["aliases"],
    json!([{"path": ":old", "type": "redirect"}, {"path": ":older"}])
  );

  let mut second = MetadataValue::new(&fields::ALIASES, resource).with_store(handle);
  assert_eq!(second.rows().unwrap(), rows);
  assert_eq!(store.borrow().document(), &migrated);
  assert!(legacy.is_empty());
  assert_eq!(*legacy.selects.borrow(), 1);
}

#[test]
fn migration_keys_on_the_canonical_path_when_set() {
  let legacy = Rc::new(FakeLegacy::with_rows("aliases", ":canonical", vec![json!(
    {"path": ":old", "type": "permanent"}
  )]));
  let context = MetadataContext::default().with_legacy_store(legacy.clone());
  let (store, handle) = native();
  store.borrow_mut().set(&fields::CANONICAL, Some(json!(":canonical"))).unwrap();

  let mut aliases =
    MetadataValue::new(&fields::ALIASES, resource_in(context, ":page")).with_store(handle);
  assert_eq!(aliases.rows().unwrap().len(), 1);
  assert!(legacy.is_empty());
}

#[test]
fn rows_left_behind_by_a_failed_delete_are_not_migrated_again() {
  let mut legacy = FakeLegacy::with_rows("aliases", ":page", vec![json!(
    {"path": ":old", "type": "redirect"}
  )]);
  legacy.fail_delete = true;
  let legacy = Rc::new(legacy);
  let context = MetadataContext::default().with_legacy_store(legacy.clone());
  let resource = resource_in(context, ":page");
  let (store, handle) = recording();

  let mut first =
    MetadataValue::new(&fields::ALIASES, Rc::clone(&resource)).with_store(handle.clone());
  let rows = first.rows().unwrap();
  assert_eq!(rows, vec![Row::new(":old").with("alias_type", TypedValue::text("redirect"))]);
  assert_eq!(store.borrow().persisted, 1);
  assert!(!legacy.is_empty());

  let mut second = MetadataValue::new(&fields::ALIASES, resource).with_store(handle);
  assert_eq!(second.rows().unwrap(), rows);
  assert_eq!(store.borrow().persisted, 1);
  assert_eq!(*legacy.selects.borrow(), 1);
}

#[test]
fn unreadable_legacy_rows_count_as_none() {
  let mut legacy = FakeLegacy::with_rows("aliases", ":page", vec![json!({"path": ":old"})]);
  legacy.fail_select = true;
  let context = MetadataContext::default().with_legacy_store(Rc::new(legacy));
  let (store, handle) = recording();

  let mut aliases =
    MetadataValue::new(&fields::ALIASES, resource_in(context, ":page")).with_store(handle);
  assert!(aliases.rows().unwrap().is_empty());
  assert_eq!(store.borrow().persisted, 0);
  assert_eq!(store.borrow().inner.get(&fields::ALIASES).unwrap(), None);
}

// ─── Transfers ───────────────────────────────────────────────────────────────

#[test]
fn submitted_alias_columns_become_records() {
  let form = FormSubmissionStore::new()
    .with("alias_path", json!([":a", "", ":b"]))
    .with("alias_type", json!(["redirect", "redirect", "permanent"]));
  let names: Vec<String> = form.keys().map(str::to_owned).collect();
  let (store, target) = native();

  let transfer = Transfer::new(resource(":page"), share(form), target)
    .with_names(names)
    .validate();
  assert_eq!(transfer.storable_names(), vec!["aliases"]);
  let outcome = transfer.process().unwrap();

  assert!(outcome.messages().is_empty(), "{:?}", outcome.messages());
  assert_eq!(
    store.borrow().document().persistent["aliases"],
    json!([{"path": ":a", "type": "redirect"}, {"path": ":b", "type": "permanent"}])
  );
}

#[test]
fn mismatched_alias_columns_abort_the_transfer() {
  let form = FormSubmissionStore::new()
    .with("alias_path", json!(["/a", "/b"]))
    .with("alias_type", json!(["redirect"]))
    .with("title", json!("Hello"));
  let names: Vec<String> = form.keys().map(str::to_owned).collect();
  let (store, target) = recording();

  let err = Transfer::new(resource(":page"), share(form), target)
    .with_names(names)
    .validate()
    .process()
    .unwrap_err();

  assert!(err.is_fatal(), "{err}");
  assert!(store.borrow().sets.is_empty());
  assert_eq!(store.borrow().persisted, 0);
}

#[test]
fn not_modifiable_fields_are_never_written() {
  let form = FormSubmissionStore::new()
    .with("page_id", json!("forged"))
    .with("title", json!("Hello"));
  let (store, target) = recording();

  let outcome = Transfer::new(resource(":page"), share(form), target)
    .with_names(["page_id", "title"])
    .validate()
    .process()
    .unwrap();

  assert_eq!(store.borrow().sets.get("page_id"), None);
  assert_eq!(store.borrow().sets.get("title"), Some(&1));
  let warnings: Vec<_> = outcome.warnings().collect();
  assert_eq!(warnings.len(), 1);
  assert_eq!(warnings[0].field.as_deref(), Some("page_id"));
  assert!(!outcome.has_errors());
}

#[test]
fn derived_fields_are_never_written() {
  let form = FormSubmissionStore::new()
    .with("date_modified", json!("2024-01-01"))
    .with("title", json!("Hello"));
  let (store, target) = recording();

  let outcome = Transfer::new(resource(":page"), share(form), target)
    .with_names(["date_modified", "title"])
    .validate()
    .process()
    .unwrap();

  assert_eq!(store.borrow().sets.get("date_modified"), None);
  assert_eq!(store.borrow().inner.get(&fields::DATE_MODIFIED).unwrap(), None);
  let warnings: Vec<_> = outcome.warnings().collect();
  assert_eq!(warnings.len(), 1);
  assert_eq!(warnings[0].field.as_deref(), Some("date_modified"));
  assert_eq!(outcome.transferred_names(), vec!["title"]);
}

#[test]
fn one_bad_field_does_not_stop_the_others() {
  let form = FormSubmissionStore::new()
    .with("title", json!("Hello"))
    .with("description", json!("About this page"))
    .with("lang", json!("english"))
    .with("region", json!("FR"))
    .with("keywords", json!(["wiki", "metadata"]));
  let names: Vec<String> = form.keys().map(str::to_owned).collect();
  let (store, target) = recording();

  let outcome = Transfer::new(resource(":page"), share(form), target)
    .with_names(names)
    .validate()
    .process()
    .unwrap();

  let errors: Vec<_> = outcome.errors().collect();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].field.as_deref(), Some("lang"));

  let store = store.borrow();
  for field in [&fields::TITLE, &fields::DESCRIPTION, &fields::REGION, &fields::KEYWORDS] {
    assert!(store.inner.get(field).unwrap().is_some(), "{} missing", field.name);
  }
  assert_eq!(store.inner.get(&fields::LANG).unwrap(), None);
  assert_eq!(store.persisted, 1);
}

#[test]
fn unknown_names_are_skipped_with_a_warning() {
  let form = FormSubmissionStore::new().with("title", json!("Hello"));
  let (_, target) = native();

  let outcome = Transfer::new(resource(":page"), share(form), target)
    .with_names(["sectok", "title"])
    .validate()
    .process()
    .unwrap();

  let warnings: Vec<_> = outcome.warnings().collect();
  assert_eq!(warnings.len(), 1);
  assert_eq!(warnings[0].field.as_deref(), Some("sectok"));
  assert_eq!(outcome.transferred_names(), vec!["title"]);
}

#[test]
fn store_failures_are_scoped_to_their_field() {
  let form = FormSubmissionStore::new()
    .with("title", json!("Hello"))
    .with("lang", json!("fr"));
  let (store, target) = recording();
  store.borrow_mut().fail_set = Some("title");

  let outcome = Transfer::new(resource(":page"), share(form), target)
    .with_names(["title", "lang"])
    .validate()
    .process()
    .unwrap();

  let errors: Vec<_> = outcome.errors().collect();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].field.as_deref(), Some("title"));
  assert_eq!(outcome.transferred_names(), vec!["lang"]);
}

#[test]
fn a_failed_persist_is_one_store_wide_error() {
  let form = FormSubmissionStore::new().with("title", json!("Hello"));
  let (store, target) = recording();
  store.borrow_mut().fail_persist = true;

  let outcome = Transfer::new(resource(":page"), share(form), target)
    .with_names(["title"])
    .validate()
    .process()
    .unwrap();

  let errors: Vec<_> = outcome.errors().collect();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].field, None);
  assert_eq!(errors[0].level, Level::Error);
}

#[test]
fn built_values_are_transferred_as_they_are() {
  let r = resource(":page");
  let (_, source) = native();
  let mut title = MetadataValue::new(&fields::TITLE, Rc::clone(&r)).with_store(source.clone());
  title.set_value(Some(TypedValue::text("Unsaved"))).unwrap();
  let path = MetadataValue::new(&fields::PATH, Rc::clone(&r)).with_store(source.clone());

  let (store, target) = native();
  let outcome = Transfer::new(r, source, target)
    .with_values(vec![title, path])
    .validate()
    .process()
    .unwrap();

  assert_eq!(outcome.transferred_names(), vec!["title"]);
  assert_eq!(outcome.warnings().count(), 1);
  assert_eq!(
    store.borrow().get(&fields::TITLE).unwrap(),
    Some(json!("Unsaved"))
  );
}

#[test]
fn config_defaults_feed_field_defaults() {
  let config = MetadataConfig { default_lang: "de".into(), ..MetadataConfig::default() };
  let r = resource_in(MetadataContext::new(config), ":page");
  let (_, handle) = native();
  let mut lang = MetadataValue::new(&fields::LANG, r).with_store(handle);
  assert_eq!(lang.get().unwrap(), Some(TypedValue::text("de")));
}
