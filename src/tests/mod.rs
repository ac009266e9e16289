mod test_comment_engine;
mod test_proxies;
mod test_timedtext;
mod test_track_selection;
mod test_transcript_engine;
