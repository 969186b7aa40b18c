//! Built-in prompt templates.
//!
//! Placeholders are `{name}` and are filled by [`crate::stage::render_template`].
//! Any of these can be replaced from the `[prompts]` section of the config
//! file.

pub const ANALYST_SYSTEM: &str = "You are a senior SEO and paid-search data analyst. \
You read raw keyword ranking exports and turn them into clear, actionable findings. \
Be precise with numbers and never invent data that is not in the inputs.";

pub const KEYWORD_ANALYSIS: &str = "Analyze the keyword ranking data for {school_name} ({domain_url}) \
against its top paid-search competitors.

The context below contains two JSON documents:
- competitor rankings: a map of competitor domain to its most successful keywords
- user rankings: the most successful keywords for {domain_url}

Produce a Markdown report with these sections:
1. Executive summary
2. Competitor overview (one short paragraph per competitor domain)
3. Keyword gap: high-volume keywords competitors rank for that {domain_url} does not
4. Cost and difficulty: which keywords offer the best volume for their cost per click and ranking difficulty
5. Recommended target keywords, as a table with keyword, search volume, difficulty, CPC and the reason to target it

Only use figures present in the data.";

pub const COPYWRITER_SYSTEM: &str = "You are a performance-marketing copywriter specialising in \
search ads for schools. You write concise, compliant ad copy that matches search intent.";

pub const AD_COPY: &str = "Write Google search ad copy for {school_name} ({domain_url}).

The context below contains the selected keywords with their search volume, ranking difficulty, \
monthly clicks, exact cost per click and number of paid competitors.

For each keyword:
- write three responsive search ad variants
- each variant has up to three headlines (max 30 characters each) and two descriptions (max 90 characters each)
- include the keyword naturally in at least one headline
- end with a clear call to action

Format the output as Markdown with one `##` section per keyword.";

pub const STRATEGIST_SYSTEM: &str = "You are a content strategist who plans SEO blog posts \
for schools. Your outlines are specific, well researched and aligned with the brand.";

pub const BLOG_OUTLINE: &str = "Create blog post outlines for {school_name} ({domain_url}).

Use the ad copies and the selected keyword details in the context to choose topics that \
support the same search intent. Use the reference pages and search results for facts about \
{business_name} and current trends.

For each selected keyword write one outline with:
- a working title containing the keyword
- the target keyword and two or three secondary keywords
- a meta description under 160 characters
- H2 and H3 headings with two or three bullet points each describing what the section covers
- a closing call to action

Do not compare with or mention other schools. Format the output as Markdown.";

pub const BLOG_SEARCH: &str = "You are an expert SEO content writer for {business_name}.
Search about {business_name}: their history, growth, awards, recognition, number of schools, \
unique offerings and expertise.

Websites to search:
{reference_urls}

You are given a blog outline and you need to search for current information, statistics \
and expert insights about:
{outline}

Focus on:
1. Recent statistics and data
2. Expert opinions and research
3. Current trends and developments
4. Best practices and examples";

pub const BLOG_POST: &str = "You are an expert SEO content writer for {business_name}.
Using the research results above, write a detailed blog post.

Follow these guidelines:
1. Use proper markdown formatting with headers, lists, etc.
2. Follow the exact structure from the outline
3. Write in proper bullet points and paragraphs
4. Naturally incorporate the target keyword and its variations
5. Focus on providing value and establishing {business_name} expertise
6. Include relevant examples and actionable insights
7. Make content factual and avoid controversial topics
8. Don't compare with or mention other schools
9. Write a compelling meta description to boost click-through rate
10. Content should meet Experience, Expertise, Authoritativeness, and Trustworthiness (EEAT) guidelines
11. Include recent statistics and data points from the research results

Blog Outline:
{outline}

Format the output as:
# [Blog Title]

**Meta Description**: [compelling meta description with target keyword]
**Target Keyword**: [main keyword from outline]
**Word Count**: [actual word count]

[Complete blog post content in markdown format...]";

pub const WRITER_SYSTEM: &str = "You are an experienced education blogger and SEO writer. \
You write engaging, factual long-form posts that follow the given outline exactly.";

pub const CREW_BLOG_POST: &str = "Write a complete blog post for {business_name} from the outline below.

Use the reference pages and search results in the context for facts, statistics and \
current information. Follow the outline's structure, use its target keyword naturally, \
write in Markdown, and finish with a call to action. Do not mention other schools.

Outline:
{outline}";

/// Search query used alongside outline and blog-writing stages.
pub const TOPIC_SEARCH_QUERY: &str = "{business_name} {topic}";

/// Search query used by the outline stage.
pub const OUTLINE_SEARCH_QUERY: &str = "{school_name} school admissions trends";
