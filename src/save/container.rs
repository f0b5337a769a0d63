//! Bounded random access into an SL2 save container
//!
//! `SaveContainer` wraps any `Read + Seek` source. The source sits behind a
//! lock held for the duration of each read (or batch of reads), and is
//! dropped with the container, so a file handle never outlives the query
//! that opened it.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use parking_lot::Mutex;

use super::layout::{CharacterLayout, ContainerLayout};
use crate::error::{container_open_error, ContainerError};
use crate::flags::EventFlagAddress;

/// An opened, size-validated save container
pub struct SaveContainer<R = BufReader<File>> {
    source: Mutex<R>,
    layout: ContainerLayout,
    len: u64,
}

impl SaveContainer<BufReader<File>> {
    /// Open a save file and validate its size against the layout
    pub fn open(path: &Path, layout: ContainerLayout) -> Result<Self, ContainerError> {
        let file = File::open(path).map_err(|e| container_open_error(path, e))?;
        log::debug!("Opened save container {}", path.display());
        Self::from_reader(BufReader::new(file), layout)
    }
}

impl<R: Read + Seek> SaveContainer<R> {
    /// Wrap an already opened source
    pub fn from_reader(mut source: R, layout: ContainerLayout) -> Result<Self, ContainerError> {
        layout.validate()?;

        let len = source.seek(SeekFrom::End(0))?;
        let required = layout.min_file_size();
        if len < required {
            return Err(ContainerError::TooSmall {
                actual: len,
                required,
            });
        }

        Ok(Self {
            source: Mutex::new(source),
            layout,
            len,
        })
    }

    pub fn layout(&self) -> &ContainerLayout {
        &self.layout
    }

    /// Size of the container in bytes, as seen when it was opened
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read one byte of a slot's flag region
    pub fn read_flag_byte(&self, slot: u32, byte_offset: u64) -> Result<u8, ContainerError> {
        let position = self.flag_position(slot, byte_offset)?;
        let mut source = self.source.lock();
        let mut byte = [0u8; 1];
        read_exact_at(&mut *source, position, &mut byte)?;
        Ok(byte[0])
    }

    /// Test a single flag bit
    pub fn is_flag_set(&self, slot: u32, address: EventFlagAddress) -> Result<bool, ContainerError> {
        let byte = self.read_flag_byte(slot, address.byte_offset)?;
        Ok(address.test(byte))
    }

    /// Test many flag bits under a single lock
    ///
    /// Reads happen in ascending offset order and each distinct byte is read
    /// once. The result is in the order of `addresses`.
    pub fn flag_states(
        &self,
        slot: u32,
        addresses: &[EventFlagAddress],
    ) -> Result<Vec<bool>, ContainerError> {
        let mut positions = Vec::with_capacity(addresses.len());
        for address in addresses {
            positions.push(self.flag_position(slot, address.byte_offset)?);
        }

        let mut order: Vec<usize> = (0..addresses.len()).collect();
        order.sort_by_key(|&i| positions[i]);

        let mut states = vec![false; addresses.len()];
        let mut source = self.source.lock();
        let mut cached: Option<(u64, u8)> = None;

        for i in order {
            let position = positions[i];
            let byte = match cached {
                Some((cached_position, byte)) if cached_position == position => byte,
                _ => {
                    let mut buf = [0u8; 1];
                    read_exact_at(&mut *source, position, &mut buf)?;
                    cached = Some((position, buf[0]));
                    buf[0]
                }
            };
            states[i] = addresses[i].test(byte);
        }

        Ok(states)
    }

    /// Raw bytes of a slot's character record
    pub fn read_character_block(
        &self,
        slot: u32,
        character: &CharacterLayout,
    ) -> Result<Vec<u8>, ContainerError> {
        self.layout.check_slot(slot)?;
        character.validate(&self.layout)?;

        let position = character.record_position(&self.layout, slot);
        let mut block = vec![0u8; character.record_size];
        let mut source = self.source.lock();
        read_exact_at(&mut *source, position, &mut block)?;
        Ok(block)
    }

    fn flag_position(&self, slot: u32, byte_offset: u64) -> Result<u64, ContainerError> {
        self.layout.check_slot(slot)?;
        if byte_offset >= self.layout.flag_region_max_size {
            return Err(ContainerError::FlagOutOfRange {
                byte_offset,
                limit: self.layout.flag_region_max_size,
            });
        }
        Ok(self.layout.flag_byte_position(slot, byte_offset))
    }
}

fn read_exact_at<R: Read + Seek>(source: &mut R, position: u64, buf: &mut [u8]) -> Result<(), ContainerError> {
    source.seek(SeekFrom::Start(position))?;
    source.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ContainerError::UnexpectedEof { offset: position }
        } else {
            ContainerError::Io(e)
        }
    })
}
