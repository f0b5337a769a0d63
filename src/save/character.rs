//! Character record decoding and slot enumeration

use std::io::{Read, Seek};
use std::path::Path;

use serde::{Serialize, Serializer};

use super::container::SaveContainer;
use super::layout::{CharacterLayout, ContainerLayout};
use crate::error::{ContainerError, DecodeError};

/// Name reported for a slot whose name field cannot be decoded
pub const PLACEHOLDER_NAME: &str = "Unknown Character";

/// Decoded state of the fixed-width name field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterName {
    /// No character in this slot (NUL or sentinel filled)
    Empty,
    Valid(String),
    /// Bytes present but not valid UTF-16
    Undecodable,
}

/// Gameplay stats reported alongside flag statuses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CharacterStats {
    pub deaths: i64,
    pub seconds_played: i64,
}

/// One slot's character record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRecord {
    pub name: CharacterName,
    pub level: i32,
    pub seconds_played: u32,
    pub deaths: u32,
}

impl CharacterRecord {
    /// Decode a record read with `SaveContainer::read_character_block`
    pub fn decode(slot: u32, bytes: &[u8], layout: &CharacterLayout) -> Result<Self, DecodeError> {
        let required = layout.required_len();
        if bytes.len() < required {
            return Err(DecodeError::Truncated {
                expected: required,
                actual: bytes.len(),
            });
        }

        let name_bytes = &bytes[layout.name_offset..layout.name_offset + layout.name_chars * 2];
        let name = match decode_name(slot, name_bytes) {
            Ok(Some(name)) => CharacterName::Valid(name),
            Ok(None) => CharacterName::Empty,
            Err(e) => {
                log::warn!("{}", e);
                CharacterName::Undecodable
            }
        };

        Ok(Self {
            name,
            level: read_i32(bytes, layout.level_offset),
            seconds_played: read_u32(bytes, layout.seconds_played_offset),
            deaths: read_u32(bytes, layout.deaths_offset),
        })
    }

    pub fn stats(&self) -> CharacterStats {
        CharacterStats {
            deaths: i64::from(self.deaths),
            seconds_played: i64::from(self.seconds_played),
        }
    }

    /// Level, or `None` when the field holds no plausible value
    pub fn known_level(&self) -> Option<i32> {
        (self.level > 0).then_some(self.level)
    }
}

/// Decode a NUL-terminated UTF-16LE name field
///
/// Returns `Ok(None)` for fields that are empty, sentinel filled (0xFFFF) or
/// hold only whitespace and control characters.
pub fn decode_name(slot: u32, raw: &[u8]) -> Result<Option<String>, DecodeError> {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();

    if units.is_empty() || units.iter().all(|&unit| unit == 0xFFFF) {
        return Ok(None);
    }

    let name = String::from_utf16(&units).map_err(|_| DecodeError::InvalidName { slot })?;
    if name.chars().all(|c| c.is_control() || c.is_whitespace() || c == '\u{FFFF}') {
        return Ok(None);
    }

    Ok(Some(name))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// Entry in the character list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterSummary {
    pub slot_index: u32,
    pub name: String,
    /// Serialized as a number, or `"unknown"`
    #[serde(serialize_with = "serialize_level")]
    pub level: Option<i32>,
}

fn serialize_level<S: Serializer>(level: &Option<i32>, serializer: S) -> Result<S::Ok, S::Error> {
    match level {
        Some(level) => serializer.serialize_i32(*level),
        None => serializer.serialize_str("unknown"),
    }
}

/// Enumerates occupied character slots
#[derive(Debug, Clone, Default)]
pub struct CharacterCatalog {
    layout: ContainerLayout,
    character: CharacterLayout,
}

impl CharacterCatalog {
    pub fn new(layout: ContainerLayout, character: CharacterLayout) -> Self {
        Self { layout, character }
    }

    /// Open a save file and list its occupied slots
    pub fn list_characters(&self, path: &Path) -> Result<Vec<CharacterSummary>, ContainerError> {
        let container = SaveContainer::open(path, self.layout)?;
        self.list_from(&container)
    }

    /// List occupied slots of an opened container
    ///
    /// Empty slots are omitted. A slot whose name cannot be decoded is kept
    /// with a placeholder name.
    pub fn list_from<R: Read + Seek>(
        &self,
        container: &SaveContainer<R>,
    ) -> Result<Vec<CharacterSummary>, ContainerError> {
        let mut characters = Vec::new();

        for slot in 0..container.layout().slot_count {
            let block = container.read_character_block(slot, &self.character)?;
            if let Some(summary) = self.summarize(slot, &block) {
                characters.push(summary);
            }
        }

        log::info!("Found {} characters", characters.len());
        Ok(characters)
    }

    /// Summary of one slot's record, `None` for an empty slot
    ///
    /// A record that fails to decode is listed with a placeholder name and
    /// unknown level.
    fn summarize(&self, slot: u32, block: &[u8]) -> Option<CharacterSummary> {
        let record = match CharacterRecord::decode(slot, block, &self.character) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Slot {}: {}", slot, e);
                return Some(CharacterSummary {
                    slot_index: slot,
                    name: PLACEHOLDER_NAME.to_string(),
                    level: None,
                });
            }
        };

        let name = match record.name {
            CharacterName::Empty => {
                log::debug!("Slot {}: empty", slot);
                return None;
            }
            CharacterName::Valid(ref name) => name.clone(),
            CharacterName::Undecodable => PLACEHOLDER_NAME.to_string(),
        };

        Some(CharacterSummary {
            slot_index: slot,
            name,
            level: record.known_level(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn small_layout() -> ContainerLayout {
        ContainerLayout {
            header_size: 0x20,
            slot_size: 0x100,
            slot_count: 4,
            flag_region_offset: 0x10,
            flag_region_max_size: 0x80,
        }
    }

    fn small_character_layout() -> CharacterLayout {
        CharacterLayout {
            record_offset: 0xA0,
            record_size: 0x30,
            name_offset: 0x00,
            name_chars: 16,
            level_offset: 0x20,
            seconds_played_offset: 0x24,
            deaths_offset: 0x28,
        }
    }

    fn encode_name(name: &str) -> Vec<u8> {
        name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn write_record(data: &mut [u8], slot: u32, name: &[u8], level: i32, seconds: u32, deaths: u32) {
        let layout = small_layout();
        let character = small_character_layout();
        let start = character.record_position(&layout, slot) as usize;

        data[start..start + name.len()].copy_from_slice(name);
        data[start + 0x20..start + 0x24].copy_from_slice(&level.to_le_bytes());
        data[start + 0x24..start + 0x28].copy_from_slice(&seconds.to_le_bytes());
        data[start + 0x28..start + 0x2C].copy_from_slice(&deaths.to_le_bytes());
    }

    // =============================================================================
    // Name decoding
    // =============================================================================

    #[test]
    fn test_decode_name_nul_terminated() {
        let mut raw = encode_name("Tarnished");
        raw.resize(32, 0);
        assert_eq!(decode_name(0, &raw).unwrap(), Some("Tarnished".to_string()));
    }

    #[test]
    fn test_decode_name_full_width_field() {
        let raw = encode_name("ABCDEFGHIJKLMNOP");
        assert_eq!(decode_name(0, &raw).unwrap(), Some("ABCDEFGHIJKLMNOP".to_string()));
    }

    #[test]
    fn test_decode_name_non_ascii() {
        let mut raw = encode_name("褪色者");
        raw.resize(32, 0);
        assert_eq!(decode_name(0, &raw).unwrap(), Some("褪色者".to_string()));
    }

    #[test]
    fn test_decode_name_empty_and_sentinel() {
        assert_eq!(decode_name(0, &[0u8; 32]).unwrap(), None);
        assert_eq!(decode_name(0, &[0xFFu8; 32]).unwrap(), None);

        let mut blanks = encode_name("   ");
        blanks.resize(32, 0);
        assert_eq!(decode_name(0, &blanks).unwrap(), None);
    }

    #[test]
    fn test_decode_name_lone_surrogate() {
        let mut raw = 0xD800u16.to_le_bytes().to_vec();
        raw.extend_from_slice(&encode_name("x"));
        raw.resize(32, 0);

        assert_eq!(decode_name(5, &raw), Err(DecodeError::InvalidName { slot: 5 }));
    }

    // =============================================================================
    // Record decoding
    // =============================================================================

    #[test]
    fn test_decode_record_fields() {
        let character = small_character_layout();
        let mut bytes = vec![0u8; character.record_size];
        let name = encode_name("Melina");
        bytes[..name.len()].copy_from_slice(&name);
        bytes[0x20..0x24].copy_from_slice(&150i32.to_le_bytes());
        bytes[0x24..0x28].copy_from_slice(&360_000u32.to_le_bytes());
        bytes[0x28..0x2C].copy_from_slice(&42u32.to_le_bytes());

        let record = CharacterRecord::decode(0, &bytes, &character).unwrap();

        assert_eq!(record.name, CharacterName::Valid("Melina".to_string()));
        assert_eq!(record.known_level(), Some(150));
        assert_eq!(record.stats(), CharacterStats { deaths: 42, seconds_played: 360_000 });
    }

    #[test]
    fn test_decode_record_truncated() {
        let character = small_character_layout();
        let bytes = vec![0u8; 0x10];

        assert_eq!(
            CharacterRecord::decode(0, &bytes, &character),
            Err(DecodeError::Truncated { expected: 0x30, actual: 0x10 })
        );
    }

    #[test]
    fn test_unknown_level() {
        let character = small_character_layout();
        let mut bytes = vec![0u8; character.record_size];
        bytes[0x20..0x24].copy_from_slice(&(-1i32).to_le_bytes());

        let record = CharacterRecord::decode(0, &bytes, &character).unwrap();
        assert_eq!(record.known_level(), None);
    }

    // =============================================================================
    // Catalog
    // =============================================================================

    #[test]
    fn test_catalog_skips_empty_slots() {
        let layout = small_layout();
        let mut data = vec![0u8; layout.min_file_size() as usize];
        write_record(&mut data, 0, &encode_name("First"), 12, 100, 3);
        write_record(&mut data, 2, &encode_name("Third"), 80, 200, 9);
        write_record(&mut data, 3, &[0xFF; 32], 0, 0, 0);

        let container = SaveContainer::from_reader(Cursor::new(data), layout).unwrap();
        let catalog = CharacterCatalog::new(layout, small_character_layout());
        let characters = catalog.list_from(&container).unwrap();

        assert_eq!(
            characters,
            vec![
                CharacterSummary { slot_index: 0, name: "First".to_string(), level: Some(12) },
                CharacterSummary { slot_index: 2, name: "Third".to_string(), level: Some(80) },
            ]
        );
    }

    #[test]
    fn test_catalog_placeholder_for_undecodable_name() {
        let layout = small_layout();
        let mut data = vec![0u8; layout.min_file_size() as usize];
        write_record(&mut data, 1, &0xDC00u16.to_le_bytes(), 5, 0, 0);
        write_record(&mut data, 2, &encode_name("Ok"), 7, 0, 0);

        let container = SaveContainer::from_reader(Cursor::new(data), layout).unwrap();
        let catalog = CharacterCatalog::new(layout, small_character_layout());
        let characters = catalog.list_from(&container).unwrap();

        assert_eq!(characters.len(), 2);
        assert_eq!(characters[0].slot_index, 1);
        assert_eq!(characters[0].name, PLACEHOLDER_NAME);
        assert_eq!(characters[1].name, "Ok");
    }

    #[test]
    fn test_catalog_placeholder_for_truncated_record() {
        let catalog = CharacterCatalog::new(small_layout(), small_character_layout());

        let summary = catalog.summarize(2, &encode_name("Short")).unwrap();
        assert_eq!(
            summary,
            CharacterSummary { slot_index: 2, name: PLACEHOLDER_NAME.to_string(), level: None }
        );

        assert_eq!(catalog.summarize(0, &[0u8; 0x30]), None);
    }

    #[test]
    fn test_summary_serializes_unknown_level() {
        let summary = CharacterSummary {
            slot_index: 3,
            name: "Nameless".to_string(),
            level: None,
        };
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["slot_index"], 3);
        assert_eq!(json["name"], "Nameless");
        assert_eq!(json["level"], "unknown");
    }

    #[test]
    fn test_catalog_from_file() {
        let layout = small_layout();
        let mut data = vec![0u8; layout.min_file_size() as usize];
        write_record(&mut data, 3, &encode_name("Last"), 1, 0, 0);

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), &data).unwrap();

        let catalog = CharacterCatalog::new(layout, small_character_layout());
        let characters = catalog.list_characters(file.path()).unwrap();

        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].name, "Last");
    }
}
