//! The builtin field catalogue.

use crate::{
  context::MetadataContext,
  descriptor::{DataType, DefaultRule, MetadataDescriptor, NativeShape, PersistenceClass},
  resource::Resource,
  value::TypedValue,
};

/// Fields that no transfer may ever write, whatever the target store.
pub const NOT_MODIFIABLE: &[&str] = &["page_id", "path"];

pub fn is_modifiable(name: &str) -> bool { !NOT_MODIFIABLE.contains(&name) }

// ─── Identity ────────────────────────────────────────────────────────────────

pub static PAGE_ID: MetadataDescriptor = MetadataDescriptor {
  name: "page_id",
  persistent_name: "page_id",
  label: "Page Id",
  mutable: false,
  ..MetadataDescriptor::BASE
};

pub static PATH: MetadataDescriptor = MetadataDescriptor {
  name: "path",
  persistent_name: "path",
  label: "Path",
  persistence: PersistenceClass::Derived,
  mutable: false,
  default_rule: DefaultRule::Computed(|r| Some(TypedValue::text(r.path()))),
  ..MetadataDescriptor::BASE
};

pub static CANONICAL: MetadataDescriptor = MetadataDescriptor {
  name: "canonical",
  persistent_name: "canonical",
  label: "Canonical",
  validate: Some(validate_wiki_path),
  ..MetadataDescriptor::BASE
};

// ─── Text ────────────────────────────────────────────────────────────────────

pub static TITLE: MetadataDescriptor = MetadataDescriptor {
  name: "title",
  persistent_name: "title",
  legacy_names: &["name"],
  label: "Title",
  default_rule: DefaultRule::Computed(default_title),
  ..MetadataDescriptor::BASE
};

pub static H1: MetadataDescriptor = MetadataDescriptor {
  name: "h1",
  persistent_name: "h1",
  label: "H1",
  default_rule: DefaultRule::Field("title"),
  ..MetadataDescriptor::BASE
};

pub static DESCRIPTION: MetadataDescriptor = MetadataDescriptor {
  name: "description",
  persistent_name: "description",
  label: "Description",
  data_type: DataType::Paragraph,
  default_rule: DefaultRule::Computed(default_description),
  native_shape: NativeShape::Provenance { primary_key: "value" },
  ..MetadataDescriptor::BASE
};

pub static LANG: MetadataDescriptor = MetadataDescriptor {
  name: "lang",
  persistent_name: "lang",
  label: "Language",
  default_rule: DefaultRule::Computed(|r| {
    Some(TypedValue::text(r.context().config().default_lang.as_str()))
  }),
  validate: Some(validate_lang),
  ..MetadataDescriptor::BASE
};

pub static REGION: MetadataDescriptor = MetadataDescriptor {
  name: "region",
  persistent_name: "region",
  label: "Region",
  validate: Some(validate_region),
  ..MetadataDescriptor::BASE
};

pub static KEYWORDS: MetadataDescriptor = MetadataDescriptor {
  name: "keywords",
  persistent_name: "keywords",
  label: "Keywords",
  data_type: DataType::List,
  ..MetadataDescriptor::BASE
};

pub static LOW_QUALITY_PAGE: MetadataDescriptor = MetadataDescriptor {
  name: "low_quality_page",
  persistent_name: "low_quality_page",
  legacy_names: &["low_quality_indicator"],
  label: "Low quality page",
  data_type: DataType::Boolean,
  default_rule: DefaultRule::Boolean(false),
  ..MetadataDescriptor::BASE
};

// ─── Dates ───────────────────────────────────────────────────────────────────

pub static DATE_PUBLISHED: MetadataDescriptor = MetadataDescriptor {
  name: "date_published",
  persistent_name: "date_published",
  legacy_names: &["published"],
  label: "Published",
  data_type: DataType::Date,
  ..MetadataDescriptor::BASE
};

pub static DATE_CREATED: MetadataDescriptor = MetadataDescriptor {
  name: "date_created",
  persistent_name: "date_created",
  legacy_names: &["created"],
  label: "Created",
  data_type: DataType::Date,
  ..MetadataDescriptor::BASE
};

pub static DATE_MODIFIED: MetadataDescriptor = MetadataDescriptor {
  name: "date_modified",
  persistent_name: "date_modified",
  label: "Modified",
  persistence: PersistenceClass::Derived,
  mutable: false,
  data_type: DataType::Date,
  default_rule: DefaultRule::Computed(|r| {
    r.render_summary().modified.map(TypedValue::Date)
  }),
  ..MetadataDescriptor::BASE
};

// ─── Aliases ─────────────────────────────────────────────────────────────────

pub static ALIAS_PATH: MetadataDescriptor = MetadataDescriptor {
  name: "alias_path",
  persistent_name: "path",
  label: "Alias path",
  validate: Some(validate_wiki_path),
  ..MetadataDescriptor::BASE
};

pub static ALIAS_TYPE: MetadataDescriptor = MetadataDescriptor {
  name: "alias_type",
  persistent_name: "type",
  label: "Alias type",
  default_rule: DefaultRule::Text("synonym"),
  validate: Some(validate_alias_type),
  ..MetadataDescriptor::BASE
};

pub static ALIASES: MetadataDescriptor = MetadataDescriptor {
  name: "aliases",
  persistent_name: "aliases",
  legacy_names: &["alias", "redirects"],
  label: "Aliases",
  data_type: DataType::Tabular,
  columns: &[&ALIAS_PATH, &ALIAS_TYPE],
  legacy_rows: true,
  ..MetadataDescriptor::BASE
};

// ─── Images ──────────────────────────────────────────────────────────────────

pub static IMAGE_PATH: MetadataDescriptor = MetadataDescriptor {
  name: "image_path",
  persistent_name: "path",
  label: "Image path",
  validate: Some(validate_image_path),
  ..MetadataDescriptor::BASE
};

pub static IMAGE_USAGE: MetadataDescriptor = MetadataDescriptor {
  name: "image_usage",
  persistent_name: "usage",
  label: "Image usage",
  data_type: DataType::List,
  default_rule: DefaultRule::List(&["all"]),
  validate: Some(validate_image_usage),
  ..MetadataDescriptor::BASE
};

pub static IMAGES: MetadataDescriptor = MetadataDescriptor {
  name: "images",
  persistent_name: "images",
  legacy_names: &["image"],
  label: "Images",
  data_type: DataType::Tabular,
  columns: &[&IMAGE_PATH, &IMAGE_USAGE],
  ..MetadataDescriptor::BASE
};

/// Every builtin top-level field, in form order.
pub static BUILTIN: &[&MetadataDescriptor] = &[
  &PAGE_ID,
  &PATH,
  &CANONICAL,
  &TITLE,
  &H1,
  &DESCRIPTION,
  &LANG,
  &REGION,
  &KEYWORDS,
  &LOW_QUALITY_PAGE,
  &DATE_PUBLISHED,
  &DATE_CREATED,
  &DATE_MODIFIED,
  &ALIASES,
  &IMAGES,
];

// ─── Defaults ────────────────────────────────────────────────────────────────

fn default_title(resource: &Resource) -> Option<TypedValue> {
  let heading = resource
    .render_summary()
    .heading
    .as_deref()
    .map(str::trim)
    .filter(|h| !h.is_empty());
  Some(TypedValue::text(heading.unwrap_or_else(|| resource.last_segment())))
}

/// The generated abstract without its leading heading text.
fn default_description(resource: &Resource) -> Option<TypedValue> {
  let render = resource.render_summary();
  let text = render.abstract_text.as_deref()?.trim();
  let text = match render.heading.as_deref().map(str::trim) {
    Some(heading) if !heading.is_empty() => {
      text.strip_prefix(heading).unwrap_or(text).trim_start()
    }
    _ => text,
  };
  (!text.is_empty()).then(|| TypedValue::text(text))
}

// ─── Validators ──────────────────────────────────────────────────────────────

fn text_of(value: &TypedValue) -> &str { value.as_text().unwrap_or_default() }

fn validate_lang(value: &TypedValue, _: &MetadataContext) -> Result<(), String> {
  let lang = text_of(value);
  if lang.len() == 2 && lang.chars().all(|c| c.is_ascii_lowercase()) {
    Ok(())
  } else {
    Err(format!("{lang:?} is not a two-letter language code"))
  }
}

fn validate_region(value: &TypedValue, _: &MetadataContext) -> Result<(), String> {
  let region = text_of(value);
  if region.len() == 2 && region.chars().all(|c| c.is_ascii_uppercase()) {
    Ok(())
  } else {
    Err(format!("{region:?} is not a two-letter region code"))
  }
}

fn validate_wiki_path(value: &TypedValue, _: &MetadataContext) -> Result<(), String> {
  let path = text_of(value);
  if path.is_empty() || path.chars().any(char::is_whitespace) {
    Err(format!("{path:?} is not a valid path"))
  } else {
    Ok(())
  }
}

fn validate_alias_type(value: &TypedValue, context: &MetadataContext) -> Result<(), String> {
  let kind = text_of(value);
  let known = &context.dictionaries().alias_types;
  if known.contains(kind) {
    Ok(())
  } else {
    Err(format!("unknown alias type {kind:?}"))
  }
}

fn validate_image_path(value: &TypedValue, context: &MetadataContext) -> Result<(), String> {
  validate_wiki_path(value, context)?;
  let path = text_of(value);
  let Some(media_dir) = &context.config().media_dir else {
    return Ok(());
  };
  let mut file = media_dir.clone();
  for segment in path.split([':', '/']).filter(|s| !s.is_empty()) {
    file.push(segment);
  }
  if file.is_file() {
    Ok(())
  } else {
    Err(format!("image {path:?} does not exist"))
  }
}

fn validate_image_usage(value: &TypedValue, context: &MetadataContext) -> Result<(), String> {
  let known = &context.dictionaries().image_usages;
  match value.as_list().unwrap_or_default().iter().find(|u| !known.contains(*u)) {
    Some(unknown) => Err(format!("unknown image usage {unknown:?}")),
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use super::*;
  use crate::{context::MetadataConfig, resource::RenderSummary};

  fn context() -> MetadataContext { MetadataContext::default() }

  #[test]
  fn lang_must_be_two_lowercase_letters() {
    let ctx = context();
    assert!(LANG.check(&TypedValue::text("fr"), &ctx).is_ok());
    assert!(LANG.check(&TypedValue::text("english"), &ctx).is_err());
    assert!(LANG.check(&TypedValue::text("FR"), &ctx).is_err());
  }

  #[test]
  fn alias_types_come_from_the_dictionary() {
    let ctx = context();
    assert!(ALIAS_TYPE.check(&TypedValue::text("redirect"), &ctx).is_ok());
    assert!(ALIAS_TYPE.check(&TypedValue::text("mirror"), &ctx).is_err());
  }

  #[test]
  fn image_paths_must_exist_when_a_media_dir_is_configured() {
    let media = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(media.path().join("img")).unwrap();
    std::fs::write(media.path().join("img").join("logo.png"), b"png").unwrap();

    let ctx = MetadataContext::new(MetadataConfig {
      media_dir: Some(media.path().to_path_buf()),
      ..MetadataConfig::default()
    });
    assert!(IMAGE_PATH.check(&TypedValue::text(":img:logo.png"), &ctx).is_ok());
    assert!(IMAGE_PATH.check(&TypedValue::text(":img:missing.png"), &ctx).is_err());
  }

  #[test]
  fn description_default_strips_the_heading() {
    let resource = Resource::new(":page", Rc::new(context())).with_render_summary(
      RenderSummary {
        abstract_text: Some("My Page\nThe body of the page.".into()),
        heading:       Some("My Page".into()),
        modified:      None,
      },
    );
    assert_eq!(
      default_description(&resource),
      Some(TypedValue::text("The body of the page."))
    );
  }

  #[test]
  fn title_defaults_to_the_last_path_segment() {
    let resource = Resource::new(":ns:my-page", Rc::new(context()));
    assert_eq!(default_title(&resource), Some(TypedValue::text("my-page")));
  }
}
