//! Header paths for library types outside the batch

use std::path::{Path, PathBuf};

use log::trace;

/// Maps qualified library type names to header paths
///
/// `java.util.List` becomes `java/util/List.h`. The first search path that
/// contains that file wins and the joined path is reported; otherwise the
/// package-derived path is used as is.
#[derive(Debug, Clone, Default)]
pub struct HeaderResolver {
    search_paths: Vec<PathBuf>,
}

pub const HEADER_EXTENSION: &str = "h";

impl HeaderResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Header of a batch output file
    pub fn for_output(name: &str) -> String {
        format!("{}.{}", name, HEADER_EXTENSION)
    }

    /// Header of a library type
    pub fn for_external(&self, qualified: &str) -> String {
        // Nested library types live in their outermost type's header
        let outer = qualified.split('$').next().unwrap_or(qualified);
        let relative = Self::for_output(&outer.replace('.', "/"));
        match self.locate(Path::new(&relative)) {
            Some(found) => {
                trace!("{} found at {}", qualified, found.display());
                found.to_string_lossy().into_owned()
            }
            None => relative,
        }
    }

    fn locate(&self, relative: &Path) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
    }
}
