//! Twin detection and rating synchronization
//!
//! A twin is the same recording appearing on more than one album
//! (studio album + compilation, reissue, box set). Twins are found
//! fresh each run: candidates bucket by (artist, normalized title),
//! pairs within a bucket join a group when their durations agree, and
//! groups are equivalence classes built with union-find. The catalog
//! is never self-joined.

use crate::catalog::{normalized_title, Catalog, Track, TwinFilter};
use crate::engine::engine_owns;
use rime_common::db::OwnershipRecord;
use rime_common::sort_key::{composite_key, sort_key};
use std::collections::HashMap;
use uuid::Uuid;

/// A resolved twin group for this run
#[derive(Debug, Clone)]
pub struct TwinGroup {
    pub id: Uuid,
    /// Ordering key of the group, for deterministic processing
    pub key: String,
    /// Track ids, ordered by their own composite keys
    pub member_ids: Vec<String>,
    /// Mean of the manual members' ratings; `None` when no member is
    /// manually rated (no synchronization occurs)
    pub agreed_rating: Option<f32>,
}

/// Find all twin groups in the catalog and compute each group's agreed
/// rating from its manually rated members.
pub fn find_twin_groups(
    catalog: &Catalog,
    state: &HashMap<String, OwnershipRecord>,
    filter: &TwinFilter,
) -> Vec<TwinGroup> {
    // 1. Pre-filter candidates and bucket by (artist, normalized title)
    let mut buckets: HashMap<(String, String), Vec<&Track>> = HashMap::new();
    for track in catalog.tracks() {
        let album = catalog.album(&track.album_id);
        if filter.is_alt_version(track, album) {
            continue;
        }
        buckets
            .entry((track.artist_id.clone(), normalized_title(&track.name)))
            .or_default()
            .push(track);
    }

    // 2. Union-find inside each bucket by duration tolerance
    let mut groups = Vec::new();
    for ((_, title), mut members) in buckets {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|a, b| a.id.cmp(&b.id));

        let mut uf = UnionFind::new(members.len());
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                if filter.durations_match(members[i].duration_ms, members[j].duration_ms) {
                    uf.union(i, j);
                }
            }
        }

        let mut by_root: HashMap<usize, Vec<&Track>> = HashMap::new();
        for (i, track) in members.iter().copied().enumerate() {
            by_root.entry(uf.find(i)).or_default().push(track);
        }

        for (_, group_members) in by_root {
            if group_members.len() < 2 {
                continue;
            }
            groups.push(build_group(&title, group_members, catalog, state));
        }
    }

    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

fn build_group(
    title: &str,
    mut members: Vec<&Track>,
    catalog: &Catalog,
    state: &HashMap<String, OwnershipRecord>,
) -> TwinGroup {
    members.sort_by_key(|t| composite_key(&[&t.sort_key(), &t.id]));

    // Manual members decide the group rating. Already-inferred values
    // never manufacture a consensus: a group with no human opinion
    // keeps whatever aggregation and inheritance produced per member.
    let manual_ratings: Vec<f32> = members
        .iter()
        .filter(|t| !engine_owns(state.get(&t.id)))
        .filter_map(|t| t.rating.filter(|r| *r > 0.0))
        .collect();

    let agreed_rating = if manual_ratings.is_empty() {
        None
    } else {
        Some(manual_ratings.iter().sum::<f32>() / manual_ratings.len() as f32)
    };

    let first = members[0];
    let artist_key = sort_key(catalog.artist_name(&first.artist_id));
    let key = composite_key(&[&artist_key, &sort_key(title), &first.id]);

    TwinGroup {
        id: Uuid::new_v4(),
        key,
        member_ids: members.iter().map(|t| t.id.clone()).collect(),
        agreed_rating,
    }
}

/// Minimal union-find over bucket indexes
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
