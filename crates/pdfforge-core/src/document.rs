//! Document model and page assembly
//!
//! A [`Document`] is an ordered sequence of pages backed by a lopdf object
//! graph. New documents are built with an [`Assembly`], which copies whole
//! pages out of source documents (or packages decoded images as pages) into
//! a fresh page tree.

use std::collections::HashMap;
use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};
use lopdf::{Dictionary, Object, ObjectId, Stream};

use crate::error::AssembleError;
use crate::source::DecodedImage;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page trees deeper than this are treated as malformed
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page and all its ancestors lack a MediaBox
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

/// Where a document's pages came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Opened from a client-supplied buffer
    Loaded { input: String },
    /// Built by an assembler operation ("merge", "split", "convert")
    Assembled { operation: &'static str },
}

/// An ordered sequence of pages
#[derive(Debug, Clone)]
pub struct Document {
    inner: lopdf::Document,
    origin: Origin,
}

impl Document {
    pub(crate) fn loaded(inner: lopdf::Document, input: &str) -> Self {
        Self {
            inner,
            origin: Origin::Loaded {
                input: input.to_string(),
            },
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn page_count(&self) -> u32 {
        self.inner.get_pages().len() as u32
    }

    /// Page object ids in page order
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().into_values().collect()
    }

    /// Decoded content stream bytes of the 1-based page `number`
    pub fn page_content(&self, number: u32) -> Option<Vec<u8>> {
        let page_id = *self.inner.get_pages().get(&number)?;
        self.inner.get_page_content(page_id).ok()
    }

    pub fn as_lopdf(&self) -> &lopdf::Document {
        &self.inner
    }

    pub(crate) fn into_lopdf(self) -> lopdf::Document {
        self.inner
    }
}

/// Builder for a new document.
///
/// Pages are appended in call order; the page tree is only written out in
/// [`Assembly::finish`], which refuses to produce an empty document.
pub struct Assembly {
    doc: lopdf::Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    operation: &'static str,
}

impl Assembly {
    pub fn new(operation: &'static str) -> Self {
        let mut doc = lopdf::Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            operation,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.kids.len() as u32
    }

    /// Copy `pages` of `source` (in the given order) onto the end of this
    /// document. `source` is not modified.
    ///
    /// Every object of the source is imported under an id offset so that
    /// repeated imports of the same source never collide; objects no copied
    /// page reaches are dropped again in [`Assembly::finish`].
    pub fn append_pages(
        &mut self,
        input: &str,
        source: &lopdf::Document,
        pages: &[ObjectId],
    ) -> Result<(), AssembleError> {
        if pages.is_empty() {
            return Ok(());
        }

        let mut selected = HashMap::with_capacity(pages.len());
        for &page_id in pages {
            selected.insert(page_id, materialize_page(input, source, page_id)?);
        }

        let id_offset = self.doc.max_id;

        for (&old_id, object) in source.objects.iter() {
            // The source's own tree is replaced by ours
            if is_tree_node(object) {
                continue;
            }

            let new_id = (old_id.0 + id_offset, old_id.1);
            let imported = match selected.get(&old_id) {
                Some(page) => {
                    let mut page = page.clone();
                    for (_, value) in page.iter_mut() {
                        *value = remap_object_refs(value.clone(), id_offset);
                    }
                    page.set("Parent", Object::Reference(self.pages_id));
                    Object::Dictionary(page)
                }
                None => remap_object_refs(object.clone(), id_offset),
            };
            self.doc.objects.insert(new_id, imported);
        }

        for &(number, generation) in pages {
            self.kids.push((number + id_offset, generation));
        }

        self.doc.max_id = (source.max_id + id_offset).max(self.doc.max_id);

        Ok(())
    }

    /// Append one page showing `image` at 1 px = 1 pt
    pub fn append_image(&mut self, image: &DecodedImage) -> Result<(), AssembleError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(image.rgb())
            .map_err(|e| AssembleError::serialization("encode image", e))?;
        let encoded = encoder
            .finish()
            .map_err(|e| AssembleError::serialization("encode image", e))?;

        let width = image.width() as i64;
        let height = image.height() as i64;

        let mut image_dict = Dictionary::new();
        image_dict.set("Type", Object::Name(b"XObject".to_vec()));
        image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        image_dict.set("Width", Object::Integer(width));
        image_dict.set("Height", Object::Integer(height));
        image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        image_dict.set("BitsPerComponent", Object::Integer(8));
        image_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        let image_id = self.doc.add_object(Stream::new(image_dict, encoded));

        let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ\n", width, height);
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(height),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ]);
        let page_id = self.doc.add_object(page);
        self.kids.push(page_id);

        Ok(())
    }

    /// Write the page tree and catalog and hand back the finished document
    pub fn finish(mut self) -> Result<Document, AssembleError> {
        if self.kids.is_empty() {
            return Err(AssembleError::EmptyInputSet(format!(
                "{} produced no pages",
                self.operation
            )));
        }

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(self.kids.len() as i64)),
            (
                "Kids",
                Object::Array(self.kids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]);
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        // Drop whatever the copied pages don't reach (unselected pages,
        // outlines, object streams) and compact the ids
        self.doc.prune_objects();
        self.doc.renumber_objects();

        Ok(Document {
            inner: self.doc,
            origin: Origin::Assembled {
                operation: self.operation,
            },
        })
    }
}

/// Clone a page dictionary with its inherited attributes made explicit
fn materialize_page(
    input: &str,
    source: &lopdf::Document,
    page_id: ObjectId,
) -> Result<Dictionary, AssembleError> {
    let mut page = source
        .get_dictionary(page_id)
        .map_err(|e| AssembleError::unreadable(input, format!("page {:?}: {}", page_id, e)))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            return Err(AssembleError::unreadable(input, "page tree too deep"));
        }
        let Ok(node) = source.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }

    if !page.has(b"MediaBox") {
        page.set(
            "MediaBox",
            Object::Array(DEFAULT_MEDIA_BOX.map(Object::Integer).to_vec()),
        );
    }

    Ok(page)
}

fn is_tree_node(object: &Object) -> bool {
    let Ok(dict) = object.as_dict() else {
        return false;
    };
    matches!(
        dict.get(b"Type").and_then(|t| t.as_name()),
        Ok(b"Catalog") | Ok(b"Pages")
    )
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}
