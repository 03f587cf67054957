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

/// Validates a signing domain name as given in the d= tag.
///
/// Internationalized names are converted to A-labels first. A single trailing
/// dot is allowed, as is a name of only one label such as `localhost`. Each
/// label consists of letters, digits, and hyphens, and does not start or end
/// with a hyphen; the last label is not all-numeric.
pub fn validate_domain(domain: &str) -> bool {
    fn is_tld(s: &str) -> bool {
        is_ldh_label(s) && !s.chars().all(|c| c.is_ascii_digit())
    }

    let domain = domain.strip_suffix('.').unwrap_or(domain);

    let Ok(domain) = idna::domain_to_ascii(domain) else {
        return false;
    };

    if !has_valid_domain_len(&domain) {
        return false;
    }

    let mut labels = domain.rsplit('.');

    if !matches!(labels.next(), Some(l) if is_tld(l)) {
        return false;
    }

    labels.all(is_ldh_label)
}

/// Validates a selector as given in the s= tag.
///
/// A selector is a dot-separated sequence of labels of letters, digits, and
/// hyphens, where a label neither starts nor ends with a hyphen.
pub fn validate_selector(selector: &str) -> bool {
    selector.split('.').all(is_ldh_label)
}

fn is_ldh_label(s: &str) -> bool {
    has_valid_label_len(s)
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

const MAX_DOMAIN_LENGTH: usize = 253;

fn has_valid_domain_len(s: &str) -> bool {
    matches!(s.len(), 1..=MAX_DOMAIN_LENGTH)
}

fn has_valid_label_len(s: &str) -> bool {
    matches!(s.len(), 1..=63)
}
