// interface.rs — Block interface selection
//
// The compiler's primary input: which block to generate and which frame ids
// it transmits (inputs) and decodes (outputs). Built from the command line;
// consumed once by the schema builder.

use crate::model::DEFAULT_TICKS_PER_S;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    /// Block name; prefixes every generated C symbol.
    pub block_name: String,
    /// Short name; prefixes the database codec symbols.
    pub nickname: String,
    /// Frame ids the block transmits, in round-robin order.
    pub input_ids: Vec<u32>,
    /// Frame ids the block decodes.
    pub output_ids: Vec<u32>,
    /// Tick rate written by the generated initialize entry point.
    pub ticks_per_s: u8,
}

impl InterfaceSpec {
    /// New spec with no frame ids. The nickname defaults to the lower-cased
    /// block name.
    pub fn new(block_name: impl Into<String>, nickname: Option<&str>) -> Self {
        let block_name = block_name.into();
        let nickname = nickname
            .map(str::to_string)
            .unwrap_or_else(|| block_name.to_lowercase());
        InterfaceSpec {
            block_name,
            nickname,
            input_ids: Vec::new(),
            output_ids: Vec::new(),
            ticks_per_s: DEFAULT_TICKS_PER_S,
        }
    }

    pub fn with_inputs(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.input_ids = ids.into_iter().collect();
        self
    }

    pub fn with_outputs(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.output_ids = ids.into_iter().collect();
        self
    }

    pub fn with_ticks_per_s(mut self, ticks_per_s: u8) -> Self {
        self.ticks_per_s = ticks_per_s;
        self
    }

    /// Canonical one-line description, hashed into the build provenance.
    pub fn canonical_text(&self) -> String {
        let join = |ids: &[u32]| {
            ids.iter()
                .map(|id| format!("0x{:X}", id))
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "name={};nickname={};inputs={};outputs={};ticks_per_s={}",
            self.block_name,
            self.nickname,
            join(&self.input_ids),
            join(&self.output_ids),
            self.ticks_per_s
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_defaults_to_lowercase_name() {
        let spec = InterfaceSpec::new("MotorCtrl", None);
        assert_eq!(spec.nickname, "motorctrl");
        let spec = InterfaceSpec::new("MotorCtrl", Some("mc"));
        assert_eq!(spec.nickname, "mc");
    }

    #[test]
    fn defaults() {
        let spec = InterfaceSpec::new("b", None);
        assert!(spec.input_ids.is_empty());
        assert!(spec.output_ids.is_empty());
        assert_eq!(spec.ticks_per_s, 100);
    }

    #[test]
    fn canonical_text_lists_ids_in_order() {
        let spec = InterfaceSpec::new("b", Some("n"))
            .with_inputs([0x200, 0x100])
            .with_outputs([5]);
        assert_eq!(
            spec.canonical_text(),
            "name=b;nickname=n;inputs=0x200,0x100;outputs=0x5;ticks_per_s=100"
        );
    }
}
