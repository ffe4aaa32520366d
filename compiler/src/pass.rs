// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the compiler's five passes, their dependency edges, and the
// artifacts they produce. Used by the pipeline runner to compute the minimal
// pass subset for each --emit target.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    ParseIds,
    LoadCatalog,
    BuildSchema,
    Synthesize,
    Emit,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type
/// in the compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Interface, // InterfaceSpec
    Catalog,   // Catalog
    Schema,    // BlockSchema
    Model,     // GeneratedBlockModel
    Generated, // GeneratedArtifacts
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// What invalidates this pass's output.
    pub invalidation_key: &'static str,
    /// Postconditions, documentation only.
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::ParseIds => PassDescriptor {
            name: "parse_ids",
            inputs: &[],
            outputs: &[ArtifactId::Interface],
            invalidation_key: "block name + nickname + id-list arguments",
            invariants: "id lists hold no repeats; malformed tokens reported",
        },
        PassId::LoadCatalog => PassDescriptor {
            name: "load_catalog",
            inputs: &[],
            outputs: &[ArtifactId::Catalog],
            invalidation_key: "database text",
            invariants: "frame ids unique within the catalog",
        },
        PassId::BuildSchema => PassDescriptor {
            name: "build_schema",
            inputs: &[PassId::ParseIds, PassId::LoadCatalog],
            outputs: &[ArtifactId::Schema],
            invalidation_key: "interface + catalog",
            invariants: "field names unique per record, at most one timeout field",
        },
        PassId::Synthesize => PassDescriptor {
            name: "synthesize",
            inputs: &[PassId::BuildSchema],
            outputs: &[ArtifactId::Model],
            invalidation_key: "schema",
            invariants: "behavior certificate holds",
        },
        PassId::Emit => PassDescriptor {
            name: "emit",
            inputs: &[PassId::Synthesize],
            outputs: &[ArtifactId::Generated],
            invalidation_key: "model",
            invariants: "byte-identical output for identical model",
        },
    }
}

// ── Stage certificates ─────────────────────────────────────────────────────

/// Machine-checkable evidence that a pass met its postconditions.
pub trait StageCert {
    /// True if every obligation holds.
    fn all_pass(&self) -> bool;
    /// Each obligation by name, with its result.
    fn obligations(&self) -> Vec<(&'static str, bool)>;
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 5] = [
    PassId::ParseIds,
    PassId::LoadCatalog,
    PassId::BuildSchema,
    PassId::Synthesize,
    PassId::Emit,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
