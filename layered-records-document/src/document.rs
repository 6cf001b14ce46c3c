//! Document-level record resolution.
//!
//! A [`Document`] holds the elements of one document. Resolving it walks the
//! elements once, tracking which compound the text is currently about, then
//! merges records across elements and cleans up the result.

use std::collections::BTreeSet;
use std::sync::Arc;

use layered_records::{
    dedup_push, remove_subsets, remove_used_subrecords, sort_merge_candidates, ContextualRange,
    MergeCandidate, PatternContext, Record, RecordTypeId, Registry, PRODUCT_ROLE,
};

use crate::config::ResolverConfig;
use crate::distance::element_distance;
use crate::element::{Element, ElementKind};
use crate::error::ResolveResult;
use crate::resolution::{CandidateResolver, Precomputed, ScanState};

/// The elements of one document and the settings used to resolve them.
pub struct Document {
    elements: Vec<Element>,
    config: ResolverConfig,
    registry: Arc<Registry>,
}

impl Document {
    pub fn new(registry: &Arc<Registry>, elements: Vec<Element>) -> Self {
        Self {
            elements,
            config: ResolverConfig::default(),
            registry: Arc::clone(registry),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Distance between the elements at indices `a` and `b`.
    pub fn element_distance(&self, a: usize, b: usize) -> ContextualRange {
        element_distance(&self.elements, a, b, &self.config)
    }

    /// Resolve the records attached to the elements.
    pub fn records(&self) -> ResolveResult<Vec<Record>> {
        self.records_with(&Precomputed)
    }

    /// Resolve with candidates produced by `resolver`.
    pub fn records_with<R: CandidateResolver + ?Sized>(
        &self,
        resolver: &R,
    ) -> ResolveResult<Vec<Record>> {
        let mut patterns = PatternContext::new();
        self.resolve(resolver, &mut patterns)
    }

    /// Resolve with candidates produced by `resolver`, widening `patterns`
    /// as definitions are found. `patterns` is reset when the pass ends,
    /// whether or not it succeeded.
    pub fn resolve<R: CandidateResolver + ?Sized>(
        &self,
        resolver: &R,
        patterns: &mut PatternContext,
    ) -> ResolveResult<Vec<Record>> {
        let result = Pass::new(self).run(resolver, patterns);
        patterns.reset();
        result
    }

    /// Record types whose patterns are widened and whose records are kept.
    fn scope(&self) -> ResolveResult<Vec<RecordTypeId>> {
        if self.config.models.is_empty() {
            return Ok(self.registry.schemas().map(|schema| schema.id()).collect());
        }
        let mut ids = Vec::with_capacity(self.config.models.len());
        for name in &self.config.models {
            ids.push(self.registry.id(name)?);
        }
        Ok(ids)
    }
}

/// A record found during the pass and the element it came from.
struct Entry {
    record: Record,
    element: usize,
    removed: bool,
}

/// Arena indices of the records kept from one element.
struct ElementRecords {
    element: usize,
    records: Vec<usize>,
}

/// Identity records the driver can fall back on for unidentified records.
#[derive(Default)]
struct IdentityTracker {
    head: Option<(Record, usize)>,
    title: Option<Record>,
    last_product: Option<Record>,
    /// Reset at the start of each element.
    last_id: Option<Record>,
}

impl IdentityTracker {
    fn head_index(&self) -> Option<usize> {
        self.head.as_ref().map(|(_, index)| *index)
    }

    fn set_head(&mut self, record: Record, element: usize) {
        log::debug!("head record from element {}: {}", element, record.to_json());
        self.head = Some((record, element));
    }

    fn clear_head(&mut self) {
        if self.head.take().is_some() {
            log::debug!("head record cleared");
        }
    }

    /// The identity to give an unidentified record.
    fn identity_for(&self, state: ScanState) -> Option<&Record> {
        let head = self.head.as_ref().map(|(record, _)| record);
        let nearest = match state {
            ScanState::PostHeading => head.or(self.last_id.as_ref()),
            ScanState::Scanning | ScanState::InsideHeadingRun => self.last_id.as_ref().or(head),
        };
        nearest
            .or(self.last_product.as_ref())
            .or(self.title.as_ref())
    }
}

struct Pass<'d> {
    doc: &'d Document,
    entries: Vec<Entry>,
    by_element: Vec<ElementRecords>,
}

impl<'d> Pass<'d> {
    fn new(doc: &'d Document) -> Self {
        Self {
            doc,
            entries: Vec::new(),
            by_element: Vec::new(),
        }
    }

    fn run<R: CandidateResolver + ?Sized>(
        mut self,
        resolver: &R,
        patterns: &mut PatternContext,
    ) -> ResolveResult<Vec<Record>> {
        let scope = self.doc.scope()?;
        self.collect(resolver, patterns, &scope)?;
        self.merge_abbreviations();
        self.consolidate_identities();
        self.merge_nearest();
        Ok(self.cleanup())
    }

    /// Walk the elements, assigning identities and gathering records.
    fn collect<R: CandidateResolver + ?Sized>(
        &mut self,
        resolver: &R,
        patterns: &mut PatternContext,
        scope: &[RecordTypeId],
    ) -> ResolveResult<()> {
        let doc = self.doc;
        let elements = &doc.elements;
        let config = &doc.config;
        let mut tracker = IdentityTracker::default();
        let mut prev_records: Vec<Record> = Vec::new();

        for (i, el) in elements.iter().enumerate() {
            if config.skips(el.kind) {
                log::trace!("skipping {:?} element {}", el.kind, i);
                continue;
            }
            tracker.last_id = None;

            if !el.definitions.is_empty() {
                for id in scope {
                    let schema = doc.registry.schema(*id);
                    patterns.update(schema, &el.definitions, config.strict_definitions)?;
                }
            }

            let el_records = resolver.element_records(i, el, patterns)?;

            if el.kind == ElementKind::Title
                && el_records.len() == 1
                && el_records[0].is_identity_only()
            {
                tracker.title = Some(el_records[0].clone());
                tracker.set_head(el_records[0].clone(), i);
            }

            if el.is_heading() {
                if let Some(head_index) = tracker.head_index() {
                    if !(i == head_index + 1 && el_records.is_empty()) {
                        tracker.clear_head();
                    }
                }
            }

            if el.is_paragraph() {
                if el.sentence_count() == 1 {
                    if el_records.len() == 1 && el_records[0].is_identity_only() {
                        tracker.set_head(el_records[0].clone(), i);
                    }
                } else if el.sentence_count() > 1 {
                    let follows_head_heading = i > 0
                        && elements[i - 1].is_heading()
                        && tracker.head_index() == Some(i - 1);
                    if !follows_head_heading {
                        let first = resolver.sentence_records(el, 0, patterns)?;
                        if first.len() == 1 && defines_sentence(&first[0], &el.sentences[0].text) {
                            tracker.set_head(first[0].clone(), i);
                        }
                    }
                }
            }

            let state = ScanState::at(elements, i, tracker.head_index());
            let record_count = el_records.len();
            let mut processed = Vec::with_capacity(record_count);
            let mut kept = Vec::new();

            for mut record in el_records {
                if record.is_identity_type() {
                    if el.is_paragraph() && !record.labels().is_empty() {
                        tracker.last_id = Some(record.clone());
                    }
                    if record.has_role(PRODUCT_ROLE) {
                        tracker.last_product = Some(record.clone());
                    }
                    if el.is_heading() && !(record.labels().is_empty() && record.names().is_empty()) {
                        if state == ScanState::InsideHeadingRun
                            && record_count == 1
                            && joins_previous_heading(&record, &prev_records)
                        {
                            record.union_identity(&prev_records[0]);
                        }
                        tracker.set_head(record.clone(), i);
                    }
                }

                if el.is_paragraph()
                    && record.is_unidentified()
                    && record.schema().identity_field().is_some()
                {
                    if let Some(identity) = tracker.identity_for(state) {
                        log::debug!(
                            "assigning {} to {} in element {}",
                            identity.to_json(),
                            record.type_name(),
                            i
                        );
                        record.assign_identity(identity.clone())?;
                    }
                }

                record.set_provenance(i);
                processed.push(record.clone());
                let duplicate = self
                    .entries
                    .iter()
                    .any(|entry| !entry.removed && entry.record == record);
                if !duplicate {
                    kept.push(self.entries.len());
                    self.entries.push(Entry {
                        record,
                        element: i,
                        removed: false,
                    });
                }
            }

            self.by_element.push(ElementRecords {
                element: i,
                records: kept,
            });
            prev_records = processed;
        }
        Ok(())
    }

    /// Add the other form of chemical abbreviations to identity names.
    fn merge_abbreviations(&mut self) {
        let abbreviations: Vec<_> = self
            .doc
            .elements
            .iter()
            .flat_map(|el| el.abbreviations.iter())
            .filter(|abbreviation| abbreviation.is_chemical())
            .collect();
        if abbreviations.is_empty() {
            return;
        }

        for entry in self.entries.iter_mut().filter(|entry| !entry.removed) {
            let Some(identity) = entry.record.identity_record_mut() else {
                continue;
            };
            for abbreviation in &abbreviations {
                let names = identity.names();
                if names.is_empty() {
                    continue;
                }
                if names.contains(&abbreviation.long) && !names.contains(&abbreviation.short) {
                    identity.add_name(&abbreviation.short);
                }
                if names.contains(&abbreviation.short) && !names.contains(&abbreviation.long) {
                    identity.add_name(&abbreviation.long);
                }
            }
        }
    }

    /// Merge identity records that refer to the same compound.
    fn consolidate_identities(&mut self) {
        let len = self.entries.len();
        for i in 0..len {
            if self.entries[i].removed {
                continue;
            }
            for j in (i + 1)..len {
                if self.entries[j].removed {
                    continue;
                }
                let same_element = self.entries[i].element == self.entries[j].element;
                let (first, second) = match (
                    self.entries[i].record.identity_record(),
                    self.entries[j].record.identity_record(),
                ) {
                    (Some(a), Some(b)) if same_identity(a, b, same_element) => (a.clone(), b.clone()),
                    _ => continue,
                };
                log::debug!(
                    "consolidating identities {} and {}",
                    first.to_json(),
                    second.to_json()
                );
                if let Some(identity) = self.entries[i].record.identity_record_mut() {
                    identity.union_identity(&second);
                }
                if let Some(identity) = self.entries[j].record.identity_record_mut() {
                    identity.union_identity(&first);
                }
                if self.entries[i].record.is_identity_type() && self.entries[j].record.is_identity_type() {
                    self.entries[j].removed = true;
                    continue;
                }
                break;
            }
        }
    }

    /// Fill each record's contextual fields from the nearest records of
    /// other elements.
    fn merge_nearest(&mut self) {
        let doc = self.doc;
        let count = self.by_element.len();
        for g in 0..count {
            if self.by_element[g].records.is_empty() {
                continue;
            }
            let element = self.by_element[g].element;

            let mut candidates: Vec<MergeCandidate<usize>> = Vec::new();
            for offset in 1..=(count - g).max(g) {
                if offset <= g {
                    let back = &self.by_element[g - offset];
                    if !back.records.is_empty() {
                        let distance = doc.element_distance(element, back.element);
                        candidates.extend(
                            back.records
                                .iter()
                                .rev()
                                .map(|index| MergeCandidate::new(distance, *index)),
                        );
                    }
                }
                if g + offset < count {
                    let forward = &self.by_element[g + offset];
                    if !forward.records.is_empty() {
                        let distance = doc.element_distance(element, forward.element);
                        candidates.extend(
                            forward
                                .records
                                .iter()
                                .map(|index| MergeCandidate::new(distance, *index)),
                        );
                    }
                }
            }
            candidates.retain(|candidate| !self.entries[candidate.record].removed);

            let entries = &self.entries;
            sort_merge_candidates(
                &mut candidates,
                |index| entries[*index].record.total_confidence(),
                doc.config.adjust_by_confidence,
            );

            for r in 0..self.by_element[g].records.len() {
                let target = self.by_element[g].records[r];
                if self.entries[target].removed {
                    continue;
                }
                for candidate in &candidates {
                    if candidate.record == target {
                        continue;
                    }
                    let (record, other) = pair_mut(&mut self.entries, target, candidate.record);
                    log::trace!(
                        "trying {} <- {} at {}",
                        record.type_name(),
                        other.type_name(),
                        candidate.distance
                    );
                    if record.merge_contextual(other, candidate.distance) {
                        log::debug!(
                            "merged {} into {} at {}",
                            other.type_name(),
                            record.type_name(),
                            candidate.distance
                        );
                    }
                }
            }
        }
    }

    /// Filter, clean and de-duplicate the final records.
    fn cleanup(self) -> Vec<Record> {
        let doc = self.doc;
        let config = &doc.config;
        let mut records = Vec::new();
        for entry in self.entries {
            if entry.removed {
                continue;
            }
            let mut record = entry.record;
            if !config.keeps_model(record.type_name()) {
                continue;
            }
            record.clean(true);
            if !record.required_fulfilled() {
                log::debug!("dropped unfulfilled {}", record.to_json());
                continue;
            }
            dedup_push(&mut records, record);
        }
        remove_subsets(&mut records, false);
        if config.remove_merged_subrecords {
            remove_used_subrecords(&mut records);
        }
        records
    }
}

/// The record the first sentence of a paragraph is about: identity only,
/// and labelled or named with a name longer than half the sentence.
fn defines_sentence(record: &Record, sentence: &str) -> bool {
    if !record.is_identity_only() {
        return false;
    }
    if !record.labels().is_empty() {
        return true;
    }
    let half = sentence.chars().count() as f64 / 2.0;
    record
        .names()
        .iter()
        .map(|name| name.chars().count())
        .max()
        .map_or(false, |longest| longest as f64 > half)
}

/// Consecutive identity-only headings that name or label the compound
/// without overlapping.
fn joins_previous_heading(record: &Record, prev_records: &[Record]) -> bool {
    let [prev] = prev_records else {
        return false;
    };
    record.is_identity_only()
        && prev.is_identity_type()
        && prev.is_identity_only()
        && !(!record.labels().is_empty() && !prev.labels().is_empty())
        && !(!record.names().is_empty() && !prev.names().is_empty())
}

/// Whether two identity records describe the same compound.
///
/// Records that each carry a label the other lacks never match. Otherwise
/// a shared normalised name or a shared label is a match, as is, within one
/// element, a names-only record next to a labels-only one.
fn same_identity(a: &Record, b: &Record, same_element: bool) -> bool {
    let (a_labels, b_labels) = (a.labels(), b.labels());
    if a_labels.difference(&b_labels).next().is_some()
        && b_labels.difference(&a_labels).next().is_some()
    {
        return false;
    }
    if !a.normalized_names().is_disjoint(&b.normalized_names())
        || !a_labels.is_disjoint(&b_labels)
    {
        return true;
    }
    same_element && complementary(a, &a_labels, b, &b_labels)
}

/// One record carries only names, the other only labels.
fn complementary(
    a: &Record,
    a_labels: &BTreeSet<String>,
    b: &Record,
    b_labels: &BTreeSet<String>,
) -> bool {
    let names_only = |record: &Record, labels: &BTreeSet<String>| {
        labels.is_empty() && !record.names().is_empty()
    };
    let labels_only = |record: &Record, labels: &BTreeSet<String>| {
        !labels.is_empty() && record.names().is_empty()
    };
    (names_only(a, a_labels) && labels_only(b, b_labels))
        || (labels_only(a, a_labels) && names_only(b, b_labels))
}

/// The record at `target` mutably and the one at `source` shared.
fn pair_mut(entries: &mut [Entry], target: usize, source: usize) -> (&mut Record, &Record) {
    if target < source {
        let (left, right) = entries.split_at_mut(source);
        (&mut left[target].record, &right[0].record)
    } else {
        let (left, right) = entries.split_at_mut(target);
        (&mut right[0].record, &left[source].record)
    }
}
