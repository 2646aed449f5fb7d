use crate::{
  block::{self, DSIZE, MAX_BLOCK_SIZE, NIL, Tag, WSIZE},
  grow::Grower,
};

/// Word, link and payload access over the region owned by a [`Grower`].
///
/// Every access is a bounds-checked slice operation; offsets that fall outside
/// the grown region panic instead of touching foreign memory.
#[derive(Debug)]
pub struct Arena<G> {
  mem: G,
}

impl<G: Grower> Arena<G> {
  pub fn new(mem: G) -> Self {
    Self { mem }
  }

  pub fn bytes(&self) -> &[u8] {
    self.mem.bytes()
  }

  pub fn len(&self) -> usize {
    self.mem.bytes().len()
  }

  /// Grows the region, keeping its total size encodable in a tag.
  pub fn grow(
    &mut self,
    incr: usize,
  ) -> Option<usize> {
    if self.len().checked_add(incr)? > MAX_BLOCK_SIZE {
      return None;
    }

    self.mem.grow(incr)
  }

  pub fn put(
    &mut self,
    offset: usize,
    word: u32,
  ) {
    self.mem.bytes_mut()[offset..offset + WSIZE].copy_from_slice(&word.to_ne_bytes());
  }

  pub fn tag(
    &self,
    bp: usize,
  ) -> Tag {
    block::header(self.bytes(), bp)
  }

  pub fn size(
    &self,
    bp: usize,
  ) -> usize {
    self.tag(bp).size
  }

  /// Writes `tag` to the header of `bp` and to the footer implied by `tag.size`.
  pub fn set_tags(
    &mut self,
    bp: usize,
    tag: Tag,
  ) {
    let word = tag.pack();
    self.put(bp - WSIZE, word);
    self.put(bp + tag.size - DSIZE, word);
  }

  pub fn next_block(
    &self,
    bp: usize,
  ) -> usize {
    block::next_block(self.bytes(), bp)
  }

  pub fn prev_block(
    &self,
    bp: usize,
  ) -> usize {
    block::prev_block(self.bytes(), bp)
  }

  /// Allocation bit of the block before `bp`, read from its footer.
  pub fn prev_allocated(
    &self,
    bp: usize,
  ) -> bool {
    Tag::unpack(block::read_word(self.bytes(), bp - DSIZE)).allocated
  }

  pub fn pred(
    &self,
    bp: usize,
  ) -> Option<usize> {
    block::pred(self.bytes(), bp)
  }

  pub fn succ(
    &self,
    bp: usize,
  ) -> Option<usize> {
    block::succ(self.bytes(), bp)
  }

  pub fn set_pred(
    &mut self,
    bp: usize,
    pred: Option<usize>,
  ) {
    self.put_link(bp, pred);
  }

  pub fn set_succ(
    &mut self,
    bp: usize,
    succ: Option<usize>,
  ) {
    self.put_link(bp + DSIZE, succ);
  }

  fn put_link(
    &mut self,
    offset: usize,
    link: Option<usize>,
  ) {
    let value = link.map_or(NIL, |bp| bp as u64);
    self.mem.bytes_mut()[offset..offset + DSIZE].copy_from_slice(&value.to_ne_bytes());
  }

  pub fn payload(
    &self,
    bp: usize,
  ) -> &[u8] {
    let size = self.size(bp);
    &self.bytes()[bp..bp + size - DSIZE]
  }

  pub fn payload_mut(
    &mut self,
    bp: usize,
  ) -> &mut [u8] {
    let size = self.size(bp);
    &mut self.mem.bytes_mut()[bp..bp + size - DSIZE]
  }

  /// Copies `len` payload bytes from block `src` to block `dst`.
  pub fn copy_payload(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  ) {
    self.mem.bytes_mut().copy_within(src..src + len, dst);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grow::VecGrower;

  #[test]
  fn test_tags_and_links() {
    let mut arena = Arena::new(VecGrower::new(256));
    arena.grow(128).unwrap();

    arena.set_tags(8, Tag::free(48));
    arena.set_tags(56, Tag::used(32));

    assert_eq!(arena.tag(8), Tag::free(48));
    assert_eq!(block::footer(arena.bytes(), 8), Tag::free(48));
    assert_eq!(arena.next_block(8), 56);
    assert_eq!(arena.prev_block(56), 8);
    assert!(!arena.prev_allocated(56));

    arena.set_pred(8, Some(56));
    arena.set_succ(8, None);
    assert_eq!(arena.pred(8), Some(56));
    assert_eq!(arena.succ(8), None);
    assert_eq!(arena.payload(56).len(), 24);
  }

  #[test]
  fn test_copy_payload() {
    let mut arena = Arena::new(VecGrower::new(256));
    arena.grow(128).unwrap();
    arena.set_tags(8, Tag::used(32));
    arena.set_tags(40, Tag::used(32));

    arena.payload_mut(8).copy_from_slice(&[7; 24]);
    arena.copy_payload(8, 40, 10);

    assert_eq!(&arena.payload(40)[..10], &[7; 10]);
    assert_eq!(&arena.payload(40)[10..], &[0; 14]);
  }
}
