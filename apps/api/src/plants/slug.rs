use std::collections::HashSet;

use crate::models::plant::Location;

/// Lowercases and collapses every run of characters outside `[a-z0-9]` into
/// a single `-`, trimming dashes from both ends.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Picks the first free slug among `name`, `name-<room or position>`, then
/// `name-1`, `name-2`, ...
pub fn unique_slug(name: &str, location: Option<&Location>, taken: &HashSet<String>) -> String {
    let mut base = slugify(name);
    if base.is_empty() {
        base = "plant".to_string();
    }
    if !taken.contains(&base) {
        return base;
    }

    let location_part = location
        .map(|loc| {
            let room = slugify(&loc.room);
            if room.is_empty() {
                slugify(&loc.position)
            } else {
                room
            }
        })
        .unwrap_or_default();
    if !location_part.is_empty() {
        let with_location = format!("{base}-{location_part}");
        if !taken.contains(&with_location) {
            return with_location;
        }
    }

    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(slugs: &[&str]) -> HashSet<String> {
        slugs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Monstera Deliciosa"), "monstera-deliciosa");
        assert_eq!(slugify("  --Fiddle   Leaf!! Fig-- "), "fiddle-leaf-fig");
        assert_eq!(slugify("Pilea #2"), "pilea-2");
        assert_eq!(slugify("Café"), "caf");
        assert_eq!(slugify("🌱"), "");
    }

    #[test]
    fn test_base_slug_when_free() {
        assert_eq!(unique_slug("Monstera", None, &taken(&[])), "monstera");
    }

    #[test]
    fn test_numbered_suffix_without_location() {
        assert_eq!(
            unique_slug("Monstera", None, &taken(&["monstera"])),
            "monstera-1"
        );
        assert_eq!(
            unique_slug("Monstera", None, &taken(&["monstera", "monstera-1"])),
            "monstera-2"
        );
    }

    #[test]
    fn test_location_suffix_preferred() {
        let kitchen = Location {
            room: "Kitchen".to_string(),
            ..Default::default()
        };
        assert_eq!(
            unique_slug("Monstera", Some(&kitchen), &taken(&["monstera"])),
            "monstera-kitchen"
        );
        assert_eq!(
            unique_slug(
                "Monstera",
                Some(&kitchen),
                &taken(&["monstera", "monstera-kitchen"])
            ),
            "monstera-1"
        );
    }

    #[test]
    fn test_position_used_when_room_blank() {
        let shelf = Location {
            position: "Top shelf".to_string(),
            ..Default::default()
        };
        assert_eq!(
            unique_slug("Monstera", Some(&shelf), &taken(&["monstera"])),
            "monstera-top-shelf"
        );
    }

    #[test]
    fn test_unsluggable_name_falls_back() {
        assert_eq!(unique_slug("???", None, &taken(&[])), "plant");
        assert_eq!(unique_slug("???", None, &taken(&["plant"])), "plant-1");
    }
}
