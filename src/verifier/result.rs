// dkim-validator – validation of DKIM signatures in email messages
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

use crate::verifier::ValidationFailure;
use std::slice;

/// The result of validating one *DKIM-Signature* header.
///
/// A result collects a message for each check that passed, and warnings for
/// tolerated irregularities. Validation stops at the first failing check; its
/// failure is recorded as the only fail entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationResult {
    index: Option<usize>,
    domain: Option<Box<str>>,
    selector: Option<Box<str>>,
    passes: Vec<String>,
    warnings: Vec<String>,
    failure: Option<ValidationFailure>,
}

impl ValidationResult {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index: Some(index),
            domain: None,
            selector: None,
            passes: vec![],
            warnings: vec![],
            failure: None,
        }
    }

    pub(crate) fn no_signature() -> Self {
        Self {
            index: None,
            domain: None,
            selector: None,
            passes: vec![],
            warnings: vec![],
            failure: Some(ValidationFailure::NoSignature),
        }
    }

    pub(crate) fn pass(&mut self, message: impl Into<String>) {
        self.passes.push(message.into());
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub(crate) fn fail(&mut self, failure: ValidationFailure) {
        self.failure = Some(failure);
    }

    pub(crate) fn set_domain(&mut self, domain: &str) {
        self.domain = Some(domain.into());
    }

    pub(crate) fn set_selector(&mut self, selector: &str) {
        self.selector = Some(selector.into());
    }

    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    /// The messages of all checks that passed, in the order performed.
    pub fn passes(&self) -> &[String] {
        &self.passes
    }

    /// The fail entries. There is at most one.
    pub fn fails(&self) -> Vec<String> {
        self.failure.iter().map(|f| f.to_string()).collect()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn failure(&self) -> Option<&ValidationFailure> {
        self.failure.as_ref()
    }

    /// The signing domain, once it has been validated.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// The selector, once it has been validated.
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// The index of the evaluated *DKIM-Signature* header among all headers
    /// of the message. There is no index when the message has no signature.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// The results of validating all DKIM signatures in a message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationResults {
    results: Vec<ValidationResult>,
}

impl ValidationResults {
    pub(crate) fn new(results: Vec<ValidationResult>) -> Self {
        Self { results }
    }

    /// Whether any of the signatures validated.
    pub fn is_valid(&self) -> bool {
        self.results.iter().any(|r| r.is_valid())
    }

    /// The per-signature results, in the order of the signatures in the
    /// message.
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn iter(&self) -> slice::Iter<'_, ValidationResult> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a ValidationResults {
    type Item = &'a ValidationResult;
    type IntoIter = slice::Iter<'a, ValidationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for ValidationResults {
    type Item = ValidationResult;
    type IntoIter = std::vec::IntoIter<ValidationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
