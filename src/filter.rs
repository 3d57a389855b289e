//! Genre filtering over an in-memory recommendation list.
//!
//! Both functions are pure and recomputed whenever their inputs change —
//! derived lists are never cached past the current list and selection.

use std::collections::BTreeMap;

use crate::api::Movie;

/// Indices of the movies visible under the given genre selection, preserving
/// the original relative order. `None` means "all" and is the identity.
/// A movie with no genre data never matches a specific genre.
pub fn compute_visible(movies: &[Movie], selected_genre: Option<u32>) -> Vec<usize> {
  match selected_genre {
    None => (0..movies.len()).collect(),
    Some(genre) => {
      movies.iter().enumerate().filter(|(_, m)| m.genre_ids.contains(&genre)).map(|(i, _)| i).collect()
    }
  }
}

/// Count how many movies carry each genre id. A movie in two genres
/// contributes to two counts. Genres with zero matches are absent, which is
/// what lets the filter bar suppress useless options.
pub fn genre_counts(movies: &[Movie]) -> BTreeMap<u32, usize> {
  let mut counts = BTreeMap::new();
  for movie in movies {
    for &genre in &movie.genre_ids {
      *counts.entry(genre).or_insert(0) += 1;
    }
  }
  counts
}

#[cfg(test)]
mod tests {
  use super::*;

  fn movie(id: u64, genre_ids: &[u32]) -> Movie {
    serde_json::from_str(&format!(r#"{{"id": {}, "title": "m{}", "genre_ids": {:?}}}"#, id, id, genre_ids)).unwrap()
  }

  // --- compute_visible ---

  #[test]
  fn all_selection_is_identity() {
    let movies = vec![movie(1, &[28]), movie(2, &[]), movie(3, &[18, 28])];
    assert_eq!(compute_visible(&movies, None), vec![0, 1, 2]);
  }

  #[test]
  fn genre_selection_keeps_only_members_in_order() {
    let movies = vec![movie(1, &[28]), movie(2, &[18]), movie(3, &[18, 28]), movie(4, &[53])];
    assert_eq!(compute_visible(&movies, Some(28)), vec![0, 2]);
    assert_eq!(compute_visible(&movies, Some(18)), vec![1, 2]);
    assert_eq!(compute_visible(&movies, Some(99)), Vec::<usize>::new());
  }

  #[test]
  fn empty_genre_data_never_matches() {
    let movies = vec![movie(1, &[]), movie(2, &[])];
    assert_eq!(compute_visible(&movies, Some(28)), Vec::<usize>::new());
    // ...but "all" still shows them
    assert_eq!(compute_visible(&movies, None), vec![0, 1]);
  }

  #[test]
  fn empty_list_yields_empty_for_any_selection() {
    let movies: Vec<Movie> = Vec::new();
    assert_eq!(compute_visible(&movies, None), Vec::<usize>::new());
    assert_eq!(compute_visible(&movies, Some(28)), Vec::<usize>::new());
  }

  // --- genre_counts ---

  #[test]
  fn counts_per_genre_membership() {
    let movies = vec![movie(1, &[28, 18]), movie(2, &[28]), movie(3, &[])];
    let counts = genre_counts(&movies);
    assert_eq!(counts.get(&28), Some(&2));
    assert_eq!(counts.get(&18), Some(&1));
    assert_eq!(counts.get(&53), None);
  }

  #[test]
  fn counts_sum_to_total_membership_pairs() {
    let movies = vec![movie(1, &[28, 18, 12]), movie(2, &[28]), movie(3, &[18, 28]), movie(4, &[])];
    let total_pairs: usize = movies.iter().map(|m| m.genre_ids.len()).sum();
    let counts = genre_counts(&movies);
    assert_eq!(counts.values().sum::<usize>(), total_pairs);
  }

  #[test]
  fn counts_of_empty_list_are_empty() {
    assert!(genre_counts(&[]).is_empty());
  }

  #[test]
  fn counted_genres_always_narrow_to_nonempty() {
    let movies = vec![movie(1, &[28, 18]), movie(2, &[878]), movie(3, &[18])];
    for (&genre, &count) in &genre_counts(&movies) {
      let visible = compute_visible(&movies, Some(genre));
      assert_eq!(visible.len(), count);
      assert!(!visible.is_empty());
    }
  }
}
