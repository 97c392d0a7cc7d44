use crate::error::SessionError;

/// Opaque identifier for a class, stable across renames and removals of
/// other classes within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u64);

/// A class label and its committed example count.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabel {
    pub id: ClassId,
    pub name: String,
    pub example_count: usize,
}

/// Ordered collection of class labels.
///
/// The registry owns names and counts only; feature vectors keyed by class
/// position live in the example buffer, and the session keeps the two in
/// step when classes are removed.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<ClassLabel>,
    next_id: u64,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn get(&self, index: usize) -> Option<&ClassLabel> {
        self.classes.get(index)
    }

    /// The generated display name for a class at `index`.
    pub fn default_name(index: usize) -> String {
        format!("Class {}", index + 1)
    }

    /// Appends a class with a positional default name and zero count.
    pub fn add_class(&mut self) -> ClassId {
        let id = ClassId(self.next_id);
        self.next_id += 1;
        self.classes.push(ClassLabel {
            id,
            name: Self::default_name(self.classes.len()),
            example_count: 0,
        });
        id
    }

    /// Commits a display name. An empty name (after trimming) reverts to
    /// the positional default; the transient empty state while the user is
    /// editing lives in the host's edit box, not here.
    pub fn rename_class(&mut self, index: usize, name: &str) -> Result<(), SessionError> {
        let class = self
            .classes
            .get_mut(index)
            .ok_or(SessionError::InvalidClass(index))?;
        let trimmed = name.trim();
        class.name = if trimmed.is_empty() {
            Self::default_name(index)
        } else {
            trimmed.to_string()
        };
        Ok(())
    }

    /// Removes the class at `index`, refusing when it is the only one left.
    /// The caller is responsible for re-indexing dependent structures.
    pub fn remove_class(&mut self, index: usize) -> Result<ClassLabel, SessionError> {
        if index >= self.classes.len() {
            return Err(SessionError::InvalidClass(index));
        }
        if self.classes.len() <= 1 {
            return Err(SessionError::LastClass);
        }
        Ok(self.classes.remove(index))
    }

    pub fn increment_count(&mut self, index: usize) -> Result<usize, SessionError> {
        let class = self
            .classes
            .get_mut(index)
            .ok_or(SessionError::InvalidClass(index))?;
        class.example_count += 1;
        Ok(class.example_count)
    }

    pub fn reset_count(&mut self, index: usize) -> Result<(), SessionError> {
        let class = self
            .classes
            .get_mut(index)
            .ok_or(SessionError::InvalidClass(index))?;
        class.example_count = 0;
        Ok(())
    }

    pub fn total_examples(&self) -> usize {
        self.classes.iter().map(|c| c.example_count).sum()
    }

    /// Names of classes that have no committed examples yet.
    pub fn empty_class_names(&self) -> Vec<String> {
        self.classes
            .iter()
            .filter(|c| c.example_count == 0)
            .map(|c| c.name.clone())
            .collect()
    }
}
